//! End-to-end decryption: documents encrypted with the RC4 standard
//! security handler, opened with and without passwords.

use pdf_strata::encryption::algorithms::{
    compute_encryption_key, compute_object_key, compute_owner_hash, compute_user_hash_r2,
};
use pdf_strata::encryption::{rc4_crypt, EncryptDict};
use pdf_strata::{Document, Error, Object, ObjectRef};

const FILE_ID: &[u8] = b"\x01\x23\x45\x67\x89\xAB\xCD\xEF";

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Derive a consistent R2 file key plus /O and /U values for `user_password`.
fn rc4_credentials(user_password: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let owner_hash = compute_owner_hash(b"owner", user_password, 2, 5);
    let scaffold = EncryptDict {
        filter: "Standard".to_string(),
        version: 1,
        length: Some(40),
        revision: 2,
        owner_password: owner_hash.clone(),
        user_password: Vec::new(),
        permissions: -44,
        encrypt_metadata: true,
    };
    let key = compute_encryption_key(user_password, &scaffold, FILE_ID);
    let user_hash = compute_user_hash_r2(&key);
    (key, owner_hash, user_hash)
}

/// A one-page document whose object 2 holds an encrypted string.
fn encrypted_pdf(user_password: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let (key, owner_hash, user_hash) = rc4_credentials(user_password);
    let object_key = compute_object_key(&key, 2, 0);
    let ciphertext = rc4_crypt(&object_key, plaintext);

    let mut buf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    let mut add = |buf: &mut Vec<u8>, body: String| {
        offsets.push(buf.len());
        buf.extend_from_slice(body.as_bytes());
    };
    add(&mut buf, "1 0 obj\n<< /Type /Catalog /Secret 2 0 R >>\nendobj\n".to_string());
    add(&mut buf, format!("2 0 obj\n<{}>\nendobj\n", hex(&ciphertext)));
    add(
        &mut buf,
        format!(
            "3 0 obj\n<< /Filter /Standard /V 1 /R 2 /O <{}> /U <{}> /P -44 /Length 40 >>\nendobj\n",
            hex(&owner_hash),
            hex(&user_hash)
        ),
    );

    let xref = buf.len();
    buf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for off in &offsets {
        buf.extend_from_slice(format!("{:010} {:05} n \n", off, 0).as_bytes());
    }
    buf.extend_from_slice(
        format!(
            "trailer\n<< /Size 4 /Root 1 0 R /Encrypt 3 0 R /ID [<{}> <{}>] >>\n",
            hex(FILE_ID),
            hex(FILE_ID)
        )
        .as_bytes(),
    );
    buf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());
    buf
}

#[test]
fn test_blank_password_document_decrypts_transparently() {
    let data = encrypted_pdf(b"", b"top secret");
    let doc = Document::from_bytes(data).unwrap();
    assert!(doc.is_encrypted());

    let secret = doc.get_object(ObjectRef::new(2, 0)).unwrap();
    assert_eq!(secret, Object::String(b"top secret".to_vec()));
}

#[test]
fn test_password_protected_document() {
    let data = encrypted_pdf(b"hunter2", b"for your eyes only");

    // Without the password the open fails outright.
    let err = Document::from_bytes(data.clone()).unwrap_err();
    assert!(matches!(err, Error::PasswordIncorrect));

    let doc = Document::from_bytes_with_password(data, b"hunter2").unwrap();
    let secret = doc.get_object(ObjectRef::new(2, 0)).unwrap();
    assert_eq!(secret, Object::String(b"for your eyes only".to_vec()));
}

#[test]
fn test_encrypt_dictionary_strings_are_not_decrypted() {
    // Fetching the Encrypt dictionary itself must return the stored /O and
    // /U values untouched, or authentication could never work.
    let data = encrypted_pdf(b"", b"x");
    let (_, owner_hash, _) = rc4_credentials(b"");

    let doc = Document::from_bytes(data).unwrap();
    let encrypt = doc.trailer().get_raw("Encrypt").unwrap().as_reference().unwrap();
    let raw = doc.xref().fetch_with(encrypt, true).unwrap();
    let parsed = EncryptDict::from_object(&raw).unwrap();
    assert_eq!(parsed.owner_password, owner_hash);
}

#[test]
fn test_unsupported_encryption_revision_fails_cleanly() {
    let mut data = encrypted_pdf(b"", b"x");
    // Bump the dictionary to an AES revision in place.
    let pos = data.windows(10).position(|w| w == b"/V 1 /R 2 ").unwrap();
    data[pos + 3] = b'4';
    data[pos + 8] = b'4';

    let err = Document::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}
