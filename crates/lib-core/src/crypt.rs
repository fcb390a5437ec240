use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::errors::{RecError, RecResult};
use crate::fields::FieldName;
use crate::fex::Fex;
use crate::record::Record;

/// Marker prefix of encrypted field values in the textual form.
pub const ENCRYPTED_PREFIX: &str = "encrypted-";

/// Capability for the symmetric cipher used on `%confidential:` fields.
/// The kernel never implements cryptography itself; callers inject a
/// provider, and the disabled stub is what you get without one.
pub trait CryptoProvider {
    fn encrypt(&self, data: &[u8], password: &str) -> RecResult<Vec<u8>>;
    fn decrypt(&self, data: &[u8], password: &str) -> RecResult<Vec<u8>>;
}

/// The stub provider: every operation reports that encryption support is
/// not enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCrypto;

impl CryptoProvider for DisabledCrypto {
    fn encrypt(&self, _data: &[u8], _password: &str) -> RecResult<Vec<u8>> {
        Err(RecError::Crypto(
            "encryption support is not enabled".to_owned(),
        ))
    }

    fn decrypt(&self, _data: &[u8], _password: &str) -> RecResult<Vec<u8>> {
        Err(RecError::Crypto(
            "encryption support is not enabled".to_owned(),
        ))
    }
}

/// Encrypt the values of the confidential fields of a record in place.
/// Fields already carrying the `encrypted-` prefix are left alone.
/// Returns how many fields were encrypted.
pub fn encrypt_record(
    record: &mut Record,
    confidential: &Fex,
    password: &str,
    provider: &dyn CryptoProvider,
) -> RecResult<usize> {
    let mut encrypted = 0usize;
    for name in confidential_names(confidential) {
        for field in record.fields_mut() {
            if !field.name().equal_p(name) || field.value().starts_with(ENCRYPTED_PREFIX) {
                continue;
            }
            let ciphertext = provider.encrypt(field.value().as_bytes(), password)?;
            field.set_value(format!("{ENCRYPTED_PREFIX}{}", BASE64.encode(ciphertext)));
            encrypted += 1;
        }
    }
    Ok(encrypted)
}

/// Decrypt the values of the confidential fields of a record in place.
/// Fields without the `encrypted-` prefix are left alone. Returns how
/// many fields were decrypted.
pub fn decrypt_record(
    record: &mut Record,
    confidential: &Fex,
    password: &str,
    provider: &dyn CryptoProvider,
) -> RecResult<usize> {
    let mut decrypted = 0usize;
    for name in confidential_names(confidential) {
        for field in record.fields_mut() {
            let Some(encoded) = field.value().strip_prefix(ENCRYPTED_PREFIX) else {
                continue;
            };
            if !field.name().equal_p(name) {
                continue;
            }
            let ciphertext = BASE64
                .decode(encoded)
                .map_err(|e| RecError::Crypto(format!("malformed encrypted value: {e}")))?;
            let plaintext = provider.decrypt(&ciphertext, password)?;
            let value = String::from_utf8(plaintext)
                .map_err(|_| RecError::Crypto("decrypted value is not text".to_owned()))?;
            field.set_value(value);
            decrypted += 1;
        }
    }
    Ok(decrypted)
}

fn confidential_names(confidential: &Fex) -> impl Iterator<Item = &FieldName> {
    confidential.iter().map(|elem| elem.name())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fex::FexDialect;
    use crate::fields::Field;

    /// A reversible toy provider for the tests: XOR with the password
    /// bytes.
    struct XorCrypto;

    impl CryptoProvider for XorCrypto {
        fn encrypt(&self, data: &[u8], password: &str) -> RecResult<Vec<u8>> {
            Ok(data
                .iter()
                .zip(password.bytes().cycle())
                .map(|(b, k)| b ^ k)
                .collect())
        }

        fn decrypt(&self, data: &[u8], password: &str) -> RecResult<Vec<u8>> {
            self.encrypt(data, password)
        }
    }

    fn record() -> Record {
        let mut record = Record::new();
        record.append_field(Field::new(FieldName::parse("Login").unwrap(), "alice"));
        record.append_field(Field::new(FieldName::parse("Password").unwrap(), "hunter2"));
        record
    }

    #[test]
    fn test_round_trip() {
        let confidential = Fex::parse("Password", FexDialect::Simple).unwrap();
        let mut record = record();

        let n = encrypt_record(&mut record, &confidential, "secret", &XorCrypto).unwrap();
        assert_eq!(n, 1);
        let value = record.get_field(1).unwrap().value().to_owned();
        assert!(value.starts_with(ENCRYPTED_PREFIX));
        assert_ne!(value, "hunter2");
        // The clear field is untouched.
        assert_eq!(record.get_field(0).unwrap().value(), "alice");

        // Encrypting again is a no-op.
        let n = encrypt_record(&mut record, &confidential, "secret", &XorCrypto).unwrap();
        assert_eq!(n, 0);

        let n = decrypt_record(&mut record, &confidential, "secret", &XorCrypto).unwrap();
        assert_eq!(n, 1);
        assert_eq!(record.get_field(1).unwrap().value(), "hunter2");
    }

    #[test]
    fn test_disabled_provider_errors() {
        let confidential = Fex::parse("Password", FexDialect::Simple).unwrap();
        let mut record = record();
        let err = encrypt_record(&mut record, &confidential, "secret", &DisabledCrypto);
        assert!(matches!(err, Err(RecError::Crypto(_))));
        // The record is left unmodified.
        assert_eq!(record.get_field(1).unwrap().value(), "hunter2");
    }
}
