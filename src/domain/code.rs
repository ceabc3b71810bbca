//! Transaction codes
//!
//! Human-readable receipt codes: `TRX-YYYYMMDD-XXXXXX`, dated by business day.

use chrono::NaiveDate;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random suffix length
const SUFFIX_LEN: usize = 6;

/// Source of transaction codes
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self, business_date: NaiveDate) -> String;
}

/// Random uppercase alphanumeric suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self, business_date: NaiveDate) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();

        format!("TRX-{}-{}", business_date.format("%Y%m%d"), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let code = RandomCodeGenerator.next_code(date);

        assert!(code.starts_with("TRX-20260302-"));
        assert_eq!(code.len(), "TRX-20260302-".len() + SUFFIX_LEN);
        assert!(code[13..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
