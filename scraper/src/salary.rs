use std::sync::OnceLock;

use regex::Regex;

/// Extracts the minimum salary from a raw salary string.
/// Returns the first number of at least 1000, which is usually the lower bound.
pub fn minimum_salary(salary_raw: &str) -> Option<i64> {
    // Numbers that may have commas (e.g., "50,000" or "50000")
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"\$?(\d{1,3}(?:,\d{3})+|\d+)").ok())
        .as_ref()?;

    re.captures_iter(salary_raw)
        .filter_map(|cap| cap.get(1))
        .filter_map(|matched| {
            let digits: String = matched
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<i64>().ok()
        })
        .find(|num| *num >= 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_salary_with_dollar_sign() {
        assert_eq!(minimum_salary("$50,000 - $70,000"), Some(50000));
    }

    #[test]
    fn test_minimum_salary_without_dollar_sign() {
        assert_eq!(minimum_salary("Salary: 60000 USD"), Some(60000));
    }

    #[test]
    fn test_minimum_salary_no_salary() {
        assert_eq!(minimum_salary("Competitive salary"), None);
    }

    #[test]
    fn test_minimum_salary_skips_small_numbers() {
        assert_eq!(minimum_salary("2 openings, $45,000/year"), Some(45000));
    }

    #[test]
    fn test_minimum_salary_per_year() {
        assert_eq!(minimum_salary("$120,000/year"), Some(120000));
    }
}
