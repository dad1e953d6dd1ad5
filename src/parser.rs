//! PDF object parser.
//!
//! This module provides parsing of PDF objects by combining tokens from the
//! lexer into complete objects (arrays, dictionaries, indirect references,
//! streams).
//!
//! # Architecture
//!
//! The parser uses a recursive descent approach:
//! 1. Read token from lexer
//! 2. Based on token type, decide how to parse
//! 3. For composite types (arrays, dicts), recursively parse contents
//!
//! # Error Handling
//!
//! All parsing functions return `IResult` from nom. Callers translate nom
//! errors into crate errors with byte offsets where needed.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings.
///
/// PDF literal strings (enclosed in parentheses) support escape sequences:
///
/// - `\n` → Line Feed (0x0A)
/// - `\r` → Carriage Return (0x0D)
/// - `\t` → Horizontal Tab (0x09)
/// - `\b` → Backspace (0x08)
/// - `\f` → Form Feed (0x0C)
/// - `\(` / `\)` → Parentheses
/// - `\\` → Backslash
/// - `\ddd` → Character with octal code (1-3 digits)
/// - `\<newline>` → Line continuation (ignored)
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(8);
                    i += 2;
                },
                b'f' => {
                    result.push(12);
                    i += 2;
                },
                b'(' => {
                    result.push(b'(');
                    i += 2;
                },
                b')' => {
                    result.push(b')');
                    i += 2;
                },
                b'\\' => {
                    result.push(b'\\');
                    i += 2;
                },
                // Line continuation: \<newline> is ignored
                b'\n' => {
                    i += 2;
                },
                b'\r' => {
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                // Octal escape: \ddd (1-3 octal digits)
                c if c.is_ascii_digit() && c < b'8' => {
                    let start = i + 1;
                    let mut octal_value = 0u32;
                    let mut octal_len = 0;

                    for j in 0..3 {
                        if start + j < raw.len() {
                            let digit = raw[start + j];
                            if (b'0'..b'8').contains(&digit) {
                                octal_value = octal_value * 8 + (digit - b'0') as u32;
                                octal_len += 1;
                            } else {
                                break;
                            }
                        } else {
                            break;
                        }
                    }

                    if octal_len > 0 {
                        result.push((octal_value & 0xFF) as u8);
                        i += 1 + octal_len;
                    } else {
                        result.push(b'\\');
                        i += 1;
                    }
                },
                // Unknown escape: keep backslash literal
                _ => {
                    result.push(b'\\');
                    i += 1;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Parse a PDF object from input bytes.
///
/// This is the main entry point for parsing PDF objects. It handles all
/// PDF object types:
/// - Primitives: null, boolean, integer, real, string, name
/// - Composites: array, dictionary, stream
/// - References: indirect object references (10 0 R)
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // Could be a plain integer OR the start of a reference (num gen R)
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    return Ok((input3, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }

            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => {
            let decoded = decode_literal_string_escapes(bytes);
            Ok((input, Object::String(decoded)))
        },

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => {
                Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Fail)))
            },
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict_obj) = parse_dictionary(input)?;

            // A dictionary followed by the 'stream' keyword is a stream object
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let dict = match dict_obj {
                    Object::Dictionary(d) => d,
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            input,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                };

                let (final_input, stream_data) = parse_stream_data(stream_input, &dict)?;

                return Ok((
                    final_input,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(stream_data),
                    },
                ));
            }

            Ok((remaining, dict_obj))
        },

        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse an indirect object: `N G obj <value> endobj`.
///
/// Returns the object number, generation, and the contained value. A missing
/// `endobj` is tolerated (the value still parses).
///
/// Some generators glue the object's integer value onto the keyword
/// ("obj1234" meaning `obj` with the value 1234); a keyword of "obj"
/// followed only by digits yields that integer as the value, with a
/// warning.
pub fn parse_indirect(input: &[u8]) -> IResult<&[u8], (u32, u16, Object)> {
    let (rest, num_tok) = token(input)?;
    let num = match num_tok {
        Token::Integer(n) if n >= 0 => n as u32,
        _ => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    };

    let (rest, gen_tok) = token(rest)?;
    let gen = match gen_tok {
        Token::Integer(g) if g >= 0 => g as u16,
        _ => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    };

    let (rest, obj_tok) = token(rest)?;
    match obj_tok {
        Token::ObjStart => {},
        Token::Keyword(word)
            if word.starts_with(b"obj")
                && word.len() > 3
                && word[3..].iter().all(u8::is_ascii_digit) =>
        {
            log::warn!(
                "bad XRef entry for object {}: value glued to the obj keyword",
                num
            );
            let glued = std::str::from_utf8(&word[3..])
                .ok()
                .and_then(|digits| digits.parse::<i64>().ok())
                .ok_or_else(|| {
                    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
                })?;
            return Ok((rest, (num, gen, Object::Integer(glued))));
        },
        _ => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }

    let (rest, value) = parse_object(rest)?;

    // endobj may be missing in damaged files
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => rest,
    };

    Ok((rest, (num, gen, value)))
}

/// Parse stream data after the `stream` keyword.
///
/// Stream data starts after the EOL following `stream` and ends with
/// `endstream`. The Length entry in the dictionary says how many bytes to
/// read; when it is missing or an unresolved reference we fall back to
/// scanning for the `endstream` keyword.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    // 'stream' must be followed by CRLF or LF; CR alone or nothing is
    // accepted leniently.
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") {
        &input[1..]
    } else if input.starts_with(b"\r") {
        log::warn!("stream keyword followed by CR alone");
        &input[1..]
    } else {
        log::warn!("no newline after stream keyword");
        input
    };

    if let Some(length) = dict.get_raw("Length").and_then(|o| o.as_integer()) {
        let length = length as usize;
        if input.len() >= length {
            let candidate = &input[length..];
            // Trust Length only if endstream actually follows
            if let Ok((remaining, Token::StreamEnd)) = token(candidate) {
                return Ok((remaining, input[..length].to_vec()));
            }
            log::warn!("stream Length {} does not land on endstream, rescanning", length);
        }
    }

    // Fallback: scan for the endstream keyword
    if let Some(pos) = find_endstream(input) {
        let mut end = pos;
        // Drop the EOL that precedes endstream, it is not stream data
        if end > 0 && input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && input[end - 1] == b'\r' {
            end -= 1;
        }
        let stream_data = input[..end].to_vec();
        let remaining = &input[pos..];
        let (remaining, _) = token(remaining)?; // consume endstream

        return Ok((remaining, stream_data));
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))
}

/// Find the position of the 'endstream' keyword in input.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input
        .windows(keyword.len())
        .position(|window| window == keyword)
}

/// Parse a PDF array: `[ obj1 obj2 ... objN ]`
///
/// Arrays can contain any PDF objects, including nested arrays and
/// dictionaries. An unclosed array at EOF returns what was collected.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((inp, tok)) => {
                if tok == Token::ArrayEnd {
                    return Ok((inp, Object::Array(objects)));
                }

                match parse_object(remaining) {
                    Ok((inp, obj)) => {
                        objects.push(obj);
                        remaining = inp;
                    },
                    Err(e) => {
                        if remaining.is_empty() {
                            return Ok((remaining, Object::Array(objects)));
                        }
                        return Err(e);
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse a PDF dictionary: `<< /Key1 value1 /Key2 value2 ... >>`
///
/// Dictionary keys must be names (starting with /). Values can be any PDF
/// object. Entries keep their order of appearance.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((inp, tok)) => {
                if tok == Token::DictEnd {
                    return Ok((inp, Object::Dictionary(dict)));
                }

                match tok {
                    Token::Name(key) => match parse_object(inp) {
                        Ok((inp, value)) => {
                            dict.insert(key, value);
                            remaining = inp;
                        },
                        Err(e) => {
                            if inp.is_empty() {
                                return Ok((inp, Object::Dictionary(dict)));
                            }
                            return Err(e);
                        },
                    },
                    _ => {
                        // Key must be a name; at EOF return what we have
                        if remaining.is_empty() {
                            return Ok((remaining, Object::Dictionary(dict)));
                        }
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Dictionary(dict)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Decode a hex string to bytes.
///
/// PDF hex strings contain pairs of hexadecimal digits representing bytes.
/// Whitespace is ignored. An odd number of digits is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let hex_str: Vec<u8> = hex_bytes
        .iter()
        .filter(|&&c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    if hex_str.is_empty() {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(hex_str.len() / 2 + 1);

    for chunk in hex_str.chunks(2) {
        let hi = chunk[0];
        let lo = if chunk.len() == 2 { chunk[1] } else { b'0' };
        let hex_digit = |c: u8| -> Result<u8> {
            (c as char).to_digit(16).map(|d| d as u8).ok_or(Error::ParseError {
                offset: 0,
                reason: format!("Invalid hex digit: {}", c as char),
            })
        };
        result.push(hex_digit(hi)? << 4 | hex_digit(lo)?);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_null() {
        let (remaining, obj) = parse_object(b"null").unwrap();
        assert_eq!(remaining, &b""[..]);
        assert_eq!(obj, Object::Null);
    }

    #[test]
    fn test_parse_booleans() {
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"false").unwrap().1, Object::Boolean(false));
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_object(b"42").unwrap().1, Object::Integer(42));
        assert_eq!(parse_object(b"-123").unwrap().1, Object::Integer(-123));
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(parse_object(b"/Type").unwrap().1, Object::Name("Type".to_string()));
    }

    #[test]
    fn test_escape_sequence_newline() {
        let (_, obj) = parse_object(b"(Line1\\nLine2)").unwrap();
        assert_eq!(obj, Object::String(b"Line1\nLine2".to_vec()));
    }

    #[test]
    fn test_escape_sequence_octal_three_digits() {
        // \247 = octal 247 = 0xA7 (section sign)
        let (_, obj) = parse_object(b"(Section \\247)").unwrap();
        assert_eq!(obj, Object::String(b"Section \xa7".to_vec()));
    }

    #[test]
    fn test_escape_sequence_octal_stops_at_non_octal() {
        // \128 = \12 (octal 12 = 10) + '8' (literal)
        let (_, obj) = parse_object(b"(Value \\128)").unwrap();
        assert_eq!(obj, Object::String(b"Value \n8".to_vec()));
    }

    #[test]
    fn test_escape_sequence_line_continuation() {
        let (_, obj) = parse_object(b"(This is a long \\\nstring)").unwrap();
        assert_eq!(obj, Object::String(b"This is a long string".to_vec()));
    }

    #[test]
    fn test_parse_hex_string() {
        let (_, obj) = parse_object(b"<48656C6C6F>").unwrap();
        assert_eq!(obj, Object::String(b"Hello".to_vec()));
    }

    #[test]
    fn test_parse_hex_string_odd_length() {
        // ABC -> AB C0
        let (_, obj) = parse_object(b"<ABC>").unwrap();
        assert_eq!(obj, Object::String(vec![0xAB, 0xC0]));
    }

    #[test]
    fn test_decode_hex_with_whitespace() {
        let result = decode_hex(b"48 65 6C 6C 6F").unwrap();
        assert_eq!(result, b"Hello");
    }

    #[test]
    fn test_parse_indirect_reference() {
        let (_, obj) = parse_object(b"10 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(10, 0)));
    }

    #[test]
    fn test_parse_integer_not_reference() {
        let (_, obj) = parse_object(b"10").unwrap();
        assert_eq!(obj, Object::Integer(10));
    }

    #[test]
    fn test_parse_array_mixed_types() {
        let (_, obj) = parse_object(b"[ 1 /Name (string) true ]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Integer(1),
                Object::Name("Name".to_string()),
                Object::String(b"string".to_vec()),
                Object::Boolean(true),
            ])
        );
    }

    #[test]
    fn test_parse_array_with_references() {
        let (_, obj) = parse_object(b"[ 10 0 R 20 0 R ]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Reference(ObjectRef::new(10, 0)),
                Object::Reference(ObjectRef::new(20, 0)),
            ])
        );
    }

    #[test]
    fn test_parse_dictionary_multiple_entries() {
        let (_, obj) = parse_object(b"<< /Type /Page /Count 3 /Title (My Page) >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get_raw("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(dict.get_raw("Count").unwrap().as_integer(), Some(3));
        assert_eq!(dict.get_raw("Title").unwrap().as_string(), Some(&b"My Page"[..]));
    }

    #[test]
    fn test_parse_dictionary_preserves_order() {
        let (_, obj) = parse_object(b"<< /Size 3 /Root 1 0 R /Prev 100 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let keys: Vec<&String> = dict.keys().collect();
        assert_eq!(keys, ["Size", "Root", "Prev"]);
    }

    #[test]
    fn test_parse_nested_dictionaries() {
        let (_, obj) = parse_object(b"<< /Outer << /Inner /Value >> >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let inner = dict.get_raw("Outer").unwrap().as_dict().unwrap();
        assert_eq!(inner.get_raw("Inner").unwrap().as_name(), Some("Value"));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { dict, data } => {
                assert_eq!(dict.get_raw("Length").unwrap().as_integer(), Some(5));
                assert_eq!(&data[..], b"Hello");
            },
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_parse_stream_without_length_scans_for_endstream() {
        let input = b"<< /Type /XObject >>\nstream\nabcdef\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abcdef"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_parse_stream_with_wrong_length_rescans() {
        let input = b"<< /Length 3 >>\nstream\nabcdef\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abcdef"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_parse_indirect_object() {
        let input = b"12 0 obj\n<< /Type /Catalog >>\nendobj";
        let (remaining, (num, gen, obj)) = parse_indirect(input).unwrap();
        assert_eq!(remaining, &b""[..]);
        assert_eq!(num, 12);
        assert_eq!(gen, 0);
        assert_eq!(obj.as_dict().unwrap().get_raw("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn test_parse_indirect_glued_obj_keyword() {
        // "obj1234" really means `obj` with the value 1234
        let input = b"12 0 obj1234\nendobj";
        let (_, (num, gen, obj)) = parse_indirect(input).unwrap();
        assert_eq!((num, gen), (12, 0));
        assert_eq!(obj, Object::Integer(1234));
    }

    #[test]
    fn test_parse_indirect_missing_endobj() {
        let input = b"3 0 obj\n42\n";
        let (_, (num, _, obj)) = parse_indirect(input).unwrap();
        assert_eq!(num, 3);
        assert_eq!(obj, Object::Integer(42));
    }

    #[test]
    fn test_parse_unclosed_array() {
        // Lenient parsing: unclosed arrays return what they have
        let (_, obj) = parse_object(b"[ 1 2 3").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_parse_dictionary_non_name_key() {
        let result = parse_object(b"<< 123 /Value >>");
        assert!(result.is_err());
    }
}
