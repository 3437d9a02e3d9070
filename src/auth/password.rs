use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::code;

pub fn generate_salt(length: usize) -> String {
    let mut rng = thread_rng();

    (0..length)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    code::sha256(format!("{password}{salt}"))
}

pub fn check_password(password: &str, salt: &str, hash: &str) -> bool {
    hash_password(password, salt) == hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password() {
        let salt = generate_salt(16);
        assert_eq!(salt.len(), 16);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(salt, generate_salt(16));

        let hash = hash_password("secret1", &salt);
        assert!(check_password("secret1", &salt, &hash));
        assert!(!check_password("secret2", &salt, &hash));
        assert!(!check_password("secret1", "other_salt", &hash));
    }
}
