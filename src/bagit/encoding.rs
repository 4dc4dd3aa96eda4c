use crate::bagit::consts::*;
use crate::bagit::error::*;
use crate::bagit::Error::{DecodeText, EncodeText, UnsupportedEncoding};
use encoding_rs::Encoding;
use std::borrow::Cow;

const CR_ENCODED: &str = "%0D";
const LF_ENCODED: &str = "%0A";
const PERCENT_ENCODED: &str = "%25";

/// Percent encodes any CR, LF, or % characters in the input string
pub fn percent_encode(value: &str) -> Cow<str> {
    if let Some(i) = value.find(|c: char| c == CR || c == LF || c == '%') {
        let mut encoded = Vec::with_capacity(value.len() + 2);
        encoded.extend_from_slice(value[..i].as_bytes());

        let search = value[i..].bytes();

        for c in search {
            match c {
                CR_B => encoded.extend_from_slice(CR_ENCODED.as_bytes()),
                LF_B => encoded.extend_from_slice(LF_ENCODED.as_bytes()),
                b'%' => encoded.extend_from_slice(PERCENT_ENCODED.as_bytes()),
                _ => encoded.push(c),
            }
        }

        // This is fine because the original value is known to be valid UTF-8
        Cow::Owned(unsafe { String::from_utf8_unchecked(encoded) })
    } else {
        value.into()
    }
}

/// Decodes the `%25`, `%0D`, and `%0A` sequences produced by `percent_encode`. All other
/// percent sequences pass through untouched.
pub fn percent_decode(value: &str) -> Cow<str> {
    if !value.contains('%') {
        return value.into();
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(i) = rest.find('%') {
        decoded.push_str(&rest[..i]);
        let candidate = rest[i..].get(..3);

        match candidate.map(|c| c.to_ascii_uppercase()).as_deref() {
            Some(CR_ENCODED) => decoded.push(CR),
            Some(LF_ENCODED) => decoded.push(LF),
            Some(PERCENT_ENCODED) => decoded.push('%'),
            _ => {
                decoded.push('%');
                rest = &rest[i + 1..];
                continue;
            }
        }

        rest = &rest[i + 3..];
    }

    decoded.push_str(rest);
    decoded.into()
}

/// Resolves a character encoding label, eg `UTF-8` or `ISO-8859-1`
pub fn char_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label_no_replacement(label.as_bytes()).ok_or_else(|| UnsupportedEncoding {
        encoding: label.into(),
    })
}

/// Decodes raw tag file bytes into UTF-8 using the bag's declared encoding
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DecodeText {
            encoding: encoding.name().into(),
        });
    }
    Ok(decoded.into_owned())
}

/// Encodes UTF-8 text into the bag's declared encoding for writing to disk
pub fn encode_text(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(EncodeText {
            encoding: encoding.name().into(),
        });
    }
    Ok(encoded.into_owned())
}

#[cfg(test)]
mod tests {
    use crate::bagit::encoding::{char_encoding, decode_text, encode_text, percent_decode, percent_encode};

    #[test]
    fn test_percent_encoding() {
        assert_eq!(
            "a\tbc%25123%0Dqwe%0A%25%25asd%0D%0A !",
            percent_encode("a\tbc%123\rqwe\n%%asd\r\n !")
        );
        assert_eq!("nothing to see here", percent_encode("nothing to see here"));
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(
            "a\tbc%123\rqwe\n%%asd\r\n !",
            percent_decode("a\tbc%25123%0Dqwe%0A%25%25asd%0D%0A !")
        );
        assert_eq!("lower case\r\n", percent_decode("lower case%0d%0a"));
        assert_eq!("50%-off", percent_decode("50%-off"));
        assert_eq!("ends with %", percent_decode("ends with %"));
    }

    #[test]
    fn test_charset_round_trip() {
        let latin1 = char_encoding("ISO-8859-1").unwrap();
        let bytes = encode_text("gr\u{fc}n", latin1).unwrap();
        assert_eq!(vec![b'g', b'r', 0xfc, b'n'], bytes);
        assert_eq!("gr\u{fc}n", decode_text(&bytes, latin1).unwrap());
    }

    #[test]
    fn test_unknown_charset_label() {
        assert!(char_encoding("KLINGON-1").is_err());
    }
}
