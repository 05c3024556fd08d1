/// Numeric-first ordering key.
///
/// Values that parse as an unsigned integer order numerically and come before
/// every value that does not; the rest order lexically among themselves. Used
/// for trailing path IDs and for reference ordinals, neither of which is
/// zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrdinalKey {
    Numeric(u64),
    Lexical(String),
}

impl OrdinalKey {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(value) => OrdinalKey::Numeric(value),
            Err(_) => OrdinalKey::Lexical(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrdinalKey;

    #[test]
    fn numeric_values_order_before_lexical_ones() {
        let mut keys = vec![
            OrdinalKey::parse("abc"),
            OrdinalKey::parse("10"),
            OrdinalKey::parse("9"),
            OrdinalKey::parse("aaa"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                OrdinalKey::Numeric(9),
                OrdinalKey::Numeric(10),
                OrdinalKey::Lexical("aaa".to_string()),
                OrdinalKey::Lexical("abc".to_string()),
            ]
        );
    }

    #[test]
    fn overflowing_numbers_fall_back_to_lexical() {
        let key = OrdinalKey::parse("99999999999999999999999");
        assert!(matches!(key, OrdinalKey::Lexical(_)));
    }
}
