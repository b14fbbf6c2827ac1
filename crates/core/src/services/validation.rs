//! Field validation: national id, phone, e-mail, protocol, category and
//! attachment checks applied before a report or user is written.

use std::sync::LazyLock;

use aniseg_common::{AppError, AppResult};
use aniseg_db::entities::report::{AnimalCondition, FileDescriptor, IncidentType};
use regex::Regex;

const MB: i64 = 1024 * 1024;

/// Size limit for video attachments.
pub const MAX_VIDEO_SIZE: i64 = 50 * MB;

/// Size limit for every other attachment.
pub const MAX_FILE_SIZE: i64 = 10 * MB;

const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

const ALLOWED_EXTENSIONS: [&str; 13] = [
    "jpg", "jpeg", "png", "gif", // images
    "mp4", "avi", "mov", // video
    "mp3", "wav", "ogg", // audio
    "pdf", "doc", "docx", // documents
];

#[allow(clippy::unwrap_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_\x60{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

#[allow(clippy::unwrap_used)]
static PROTOCOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ANI-\d{8}-\d{5}$").unwrap());

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn verifier_digit(base: &[u32]) -> u32 {
    let weight_start = base.len() as u32 + 1;
    let sum: u32 = base
        .iter()
        .zip((2..=weight_start).rev())
        .map(|(d, w)| d * w)
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

/// Stateless field validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValidator;

impl FieldValidator {
    /// Create a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// CPF with valid mod-11 check digits. Punctuation is ignored.
    #[must_use]
    pub fn is_valid_cpf(&self, cpf: &str) -> bool {
        let d = digits(cpf);
        if d.len() != 11 || d.iter().all(|&x| x == d[0]) {
            return false;
        }
        verifier_digit(&d[..9]) == d[9] && verifier_digit(&d[..10]) == d[10]
    }

    /// Brazilian landline (10 digits) or mobile (11 digits, leading 9).
    #[must_use]
    pub fn is_valid_phone(&self, phone: &str) -> bool {
        let d = digits(phone);
        if d.len() != 10 && d.len() != 11 {
            return false;
        }
        let ddd = d[0] * 10 + d[1];
        if !(11..=99).contains(&ddd) {
            return false;
        }
        (d.len() == 11) == (d[2] == 9)
    }

    /// E-mail address with a dotted domain.
    #[must_use]
    pub fn is_valid_email(&self, email: &str) -> bool {
        if email.is_empty() || email.len() > 254 {
            return false;
        }
        let email = email.trim();
        EMAIL_RE.is_match(email)
            && email
                .split_once('@')
                .is_some_and(|(_, domain)| domain.contains('.'))
    }

    /// `ANI-YYYYMMDD-NNNNN`.
    #[must_use]
    pub fn is_valid_protocol(&self, protocol: &str) -> bool {
        PROTOCOL_RE.is_match(protocol)
    }

    /// Parse an incident category, case-insensitively.
    pub fn parse_category(&self, category: &str) -> AppResult<IncidentType> {
        let wanted = category.trim().to_lowercase();
        [
            IncidentType::Abandonment,
            IncidentType::Mistreatment,
            IncidentType::Neglect,
            IncidentType::PhysicalViolence,
            IncidentType::IllegalTrade,
            IncidentType::Other,
        ]
        .into_iter()
        .find(|t| t.as_str() == wanted)
        .ok_or_else(|| AppError::Validation(format!("invalid incident type: {category}")))
    }

    /// Parse an animal condition, case-insensitively.
    pub fn parse_condition(&self, condition: &str) -> AppResult<AnimalCondition> {
        let wanted = condition.trim().to_lowercase();
        [
            AnimalCondition::Healthy,
            AnimalCondition::Injured,
            AnimalCondition::Malnourished,
            AnimalCondition::AtRisk,
        ]
        .into_iter()
        .find(|c| c.as_str() == wanted)
        .ok_or_else(|| AppError::Validation(format!("invalid animal condition: {condition}")))
    }

    /// Extension allow-list and size limit for one attachment.
    pub fn check_file(&self, file: &FileDescriptor) -> AppResult<()> {
        let ext = extension(&file.name)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| AppError::Validation(format!("file type not allowed: {}", file.name)))?;

        let limit = if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MAX_VIDEO_SIZE
        } else {
            MAX_FILE_SIZE
        };
        if file.size < 0 || file.size > limit {
            return Err(AppError::Validation(format!("file too large: {}", file.name)));
        }
        Ok(())
    }

    /// A non-empty list of acceptable attachments.
    pub fn check_files(&self, files: &[FileDescriptor]) -> AppResult<()> {
        if files.is_empty() {
            return Err(AppError::Validation(
                "at least one evidence file is required".to_string(),
            ));
        }
        files.iter().try_for_each(|f| self.check_file(f))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(name: &str, size: i64) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            size,
        }
    }

    #[test]
    fn test_cpf() {
        let v = FieldValidator::new();
        assert!(v.is_valid_cpf("529.982.247-25"));
        assert!(v.is_valid_cpf("52998224725"));
        assert!(!v.is_valid_cpf("52998224724"));
        assert!(!v.is_valid_cpf("111.111.111-11"));
        assert!(!v.is_valid_cpf("1234567890"));
    }

    #[test]
    fn test_phone() {
        let v = FieldValidator::new();
        assert!(v.is_valid_phone("(11) 98765-4321"));
        assert!(v.is_valid_phone("1133334444"));
        assert!(!v.is_valid_phone("11 88765-4321"));
        assert!(!v.is_valid_phone("1193334444"));
        assert!(!v.is_valid_phone("0933334444"));
        assert!(!v.is_valid_phone("123"));
    }

    #[test]
    fn test_email() {
        let v = FieldValidator::new();
        assert!(v.is_valid_email("fiscal@prefeitura.sp.gov.br"));
        assert!(!v.is_valid_email("fiscal@localhost"));
        assert!(!v.is_valid_email("not-an-email"));
        assert!(!v.is_valid_email(""));
    }

    #[test]
    fn test_protocol() {
        let v = FieldValidator::new();
        assert!(v.is_valid_protocol("ANI-20251117-00001"));
        assert!(!v.is_valid_protocol("ANI-2025111-00001"));
        assert!(!v.is_valid_protocol("ani-20251117-00001"));
    }

    #[test]
    fn test_category_and_condition() {
        let v = FieldValidator::new();
        assert_eq!(
            v.parse_category(" Maus_Tratos ").unwrap(),
            IncidentType::Mistreatment
        );
        assert!(v.parse_category("furto").is_err());
        assert_eq!(
            v.parse_condition("em_risco").unwrap(),
            AnimalCondition::AtRisk
        );
        assert!(v.parse_condition("morto").is_err());
    }

    #[test]
    fn test_file_rules() {
        let v = FieldValidator::new();
        assert!(v.check_file(&file("foto.JPG", 2 * MB)).is_ok());
        assert!(v.check_file(&file("video.mp4", 40 * MB)).is_ok());
        assert!(v.check_file(&file("video.mov", 51 * MB)).is_err());
        assert!(v.check_file(&file("audio.mp3", 11 * MB)).is_err());
        assert!(v.check_file(&file("script.exe", 1)).is_err());
        assert!(v.check_file(&file("semextensao", 1)).is_err());
        assert!(v.check_files(&[]).is_err());
    }
}
