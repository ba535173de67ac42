//! FF1 format-preserving encryption
//!
//! Characters outside the alphabet stay in place and only the alphabet
//! characters are encrypted, so `1234-5678` keeps its dash. FF1 needs a
//! minimum number of numerals for the radix; shorter inputs pass through
//! unchanged with a warning.

use super::{PseudoFunc, PseudoFuncOutput};
use crate::domain::{FuncError, PseudoError, Result};
use crate::kms::DataKey;
use aes::Aes256;
use fpe::ff1::{FlexibleNumeralString, FF1};
use std::str::FromStr;

const DIGITS: &str = "0123456789";
const ALPHANUMERIC: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ALPHANUMERIC_WHITESPACE: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz ";

/// Smallest domain FF1 accepts (radix ^ length)
const MIN_DOMAIN_SIZE: u64 = 1_000_000;

/// Characters eligible for encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alphabet {
    /// `0-9`
    Digits,
    /// `0-9A-Za-z`
    #[default]
    Alphanumeric,
    /// `0-9A-Za-z` and space
    AlphanumericWhitespace,
}

impl Alphabet {
    fn chars(&self) -> &'static str {
        match self {
            Alphabet::Digits => DIGITS,
            Alphabet::Alphanumeric => ALPHANUMERIC,
            Alphabet::AlphanumericWhitespace => ALPHANUMERIC_WHITESPACE,
        }
    }

    fn radix(&self) -> u32 {
        self.chars().len() as u32
    }

    fn index_of(&self, c: char) -> Option<u16> {
        self.chars().find(c).map(|idx| idx as u16)
    }

    fn char_at(&self, idx: u16) -> Option<char> {
        self.chars().chars().nth(idx as usize)
    }

    /// Fewest numerals FF1 accepts for this alphabet
    pub fn min_len(&self) -> usize {
        let radix = u64::from(self.radix());
        let mut len = 1;
        let mut domain = radix;
        while domain < MIN_DOMAIN_SIZE {
            domain *= radix;
            len += 1;
        }
        len
    }
}

impl FromStr for Alphabet {
    type Err = PseudoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digits" => Ok(Alphabet::Digits),
            "alphanumeric" => Ok(Alphabet::Alphanumeric),
            "alphanumeric-whitespace" => Ok(Alphabet::AlphanumericWhitespace),
            other => Err(PseudoError::Configuration(format!(
                "Unknown FPE alphabet '{other}'. Must be one of: digits, alphanumeric, alphanumeric-whitespace"
            ))),
        }
    }
}

/// Naming and tweak of an FF1 instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpeVariant {
    /// `fpe`
    Ff1,
    /// `ff31`, domain separated from `fpe` by its tweak
    Ff31,
}

impl FpeVariant {
    fn algorithm(&self) -> &'static str {
        match self {
            FpeVariant::Ff1 => "FF1_AES256",
            FpeVariant::Ff31 => "TINK_FPE_FF31",
        }
    }

    fn tweak(&self) -> &'static [u8] {
        match self {
            FpeVariant::Ff1 => b"",
            FpeVariant::Ff31 => b"ff31",
        }
    }
}

/// Format-preserving encryption over an [`Alphabet`]
pub struct FpeFunc {
    cipher: FF1<Aes256>,
    alphabet: Alphabet,
    variant: FpeVariant,
}

impl FpeFunc {
    /// Creates a function keyed with the key's cipher key
    pub fn new(key: &DataKey, alphabet: Alphabet, variant: FpeVariant) -> Result<Self> {
        let cipher = FF1::<Aes256>::new(key.cipher_key(), alphabet.radix()).map_err(|e| {
            PseudoError::Configuration(format!("Invalid FPE radix {}: {e:?}", alphabet.radix()))
        })?;
        Ok(Self {
            cipher,
            alphabet,
            variant,
        })
    }

    /// The alphabet in use
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    fn transform(&self, value: &str, encrypt: bool) -> std::result::Result<PseudoFuncOutput, FuncError> {
        let chars: Vec<char> = value.chars().collect();
        let mut positions = Vec::new();
        let mut numerals = Vec::new();
        for (pos, c) in chars.iter().enumerate() {
            if let Some(idx) = self.alphabet.index_of(*c) {
                positions.push(pos);
                numerals.push(idx);
            }
        }

        let min_len = self.alphabet.min_len();
        if numerals.len() < min_len {
            return Ok(PseudoFuncOutput::of(value).with_warning(format!(
                "{} skipped a value with {} encryptable characters, at least {min_len} required",
                self.variant.algorithm(),
                numerals.len()
            )));
        }

        let input = FlexibleNumeralString::from(numerals);
        let output = if encrypt {
            self.cipher
                .encrypt(self.variant.tweak(), &input)
                .map_err(|e| FuncError::Encrypt(format!("{e:?}")))?
        } else {
            self.cipher
                .decrypt(self.variant.tweak(), &input)
                .map_err(|e| FuncError::Decrypt(format!("{e:?}")))?
        };

        let mut result = chars;
        for (pos, idx) in positions.into_iter().zip(Vec::<u16>::from(output)) {
            result[pos] = self.alphabet.char_at(idx).ok_or_else(|| {
                FuncError::Encrypt(format!("numeral {idx} outside alphabet"))
            })?;
        }
        Ok(PseudoFuncOutput::of(result.into_iter().collect::<String>()))
    }
}

impl PseudoFunc for FpeFunc {
    fn algorithm(&self) -> &str {
        self.variant.algorithm()
    }

    fn apply(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        self.transform(value, true)
    }

    fn restore(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        self.transform(value, false)
    }
}
