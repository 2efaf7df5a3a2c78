//! Session metrics: message length and utility

use parley_types::Role;

/// Counts the words of a message that carry meaning
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Counts whitespace-separated tokens that are purely alphabetic once
/// surrounding punctuation is stripped
///
/// Numbers and bare punctuation do not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphabeticTokenizer;

impl Tokenizer for AlphabeticTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty() && t.chars().all(char::is_alphabetic))
            .count()
    }
}

/// Mean token count per text, rounded to 4 decimals; 0.0 for no texts
pub fn avg_message_length<'a, I>(tokenizer: &dyn Tokenizer, texts: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let (total, n) = texts
        .into_iter()
        .fold((0usize, 0usize), |(total, n), t| (total + tokenizer.count(t), n + 1));
    if n == 0 {
        return 0.0;
    }
    let avg = total as f64 / n as f64;
    (avg * 10_000.0).round() / 10_000.0
}

/// Share of the opening gap each side kept
///
/// The `+ 1` terms keep the ratio finite when both opening prices coincide.
pub fn utility(role: Role, initial_price: f64, initial_buyer_offer: f64, final_price: f64) -> f64 {
    let span = initial_price - initial_buyer_offer + 1.0;
    match role {
        Role::Buyer => 1.0 - (final_price - initial_buyer_offer + 1.0) / span,
        Role::Seller => 1.0 - (initial_price - final_price + 1.0) / span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabetic_tokens() {
        let tokenizer = AlphabeticTokenizer;
        assert_eq!(tokenizer.count("Buyer : I can offer 50 dollars, final."), 6);
        assert_eq!(tokenizer.count("$75.00 ok?"), 1);
        assert_eq!(tokenizer.count(""), 0);
    }

    #[test]
    fn test_avg_message_length() {
        let tokenizer = AlphabeticTokenizer;
        assert_eq!(avg_message_length(&tokenizer, ["one two", "three"]), 1.5);
        assert_eq!(avg_message_length(&tokenizer, ["a b", "c", "d"]), 1.3333);
        assert_eq!(avg_message_length(&tokenizer, Vec::<&str>::new()), 0.0);
    }

    #[test]
    fn test_buyer_utility() {
        let u = utility(Role::Buyer, 100.0, 50.0, 75.0);
        assert!((u - (1.0 - 26.0 / 51.0)).abs() < 1e-12);
        assert!((u - 0.4902).abs() < 1e-4);
    }

    #[test]
    fn test_seller_utility() {
        let u = utility(Role::Seller, 100.0, 50.0, 75.0);
        assert!((u - (1.0 - 26.0 / 51.0)).abs() < 1e-12);
        assert_eq!(utility(Role::Seller, 80.0, 80.0, 80.0), 0.0);
    }
}
