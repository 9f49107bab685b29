use rand::distributions::Alphanumeric;
use rand::Rng;

use marktforge_storage::PairCredentials;

const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Target-site login: `user_` plus 8 lowercase alphanumerics.
pub fn generate_login() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| LOWER_ALNUM[rng.gen_range(0..LOWER_ALNUM.len())] as char)
        .collect();
    format!("user_{}", suffix)
}

/// Target-site password: 12 mixed-case alphanumerics.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

pub fn generate_pair() -> PairCredentials {
    PairCredentials {
        login: generate_login(),
        password: generate_password(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_shape() {
        for _ in 0..50 {
            let login = generate_login();
            let suffix = login.strip_prefix("user_").expect("user_ prefix");
            assert_eq!(suffix.len(), 8);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn password_shape() {
        for _ in 0..50 {
            let password = generate_password();
            assert_eq!(password.len(), 12);
            assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn credentials_vary() {
        assert_ne!(generate_login(), generate_login());
        assert_ne!(generate_password(), generate_password());
    }
}
