//! セッション鍵の導出と鍵確認値
//!
//! ```text
//! session_key = HKDF-SHA256(salt = random_c || random_s, ikm = psk, info = SESSION_KEY_INFO)[..16]
//! verify      = HMAC-SHA256(session_key, VERIFY_LABEL || random_c)[..16]
//! ```

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use secpump_proto::RANDOM_LEN;

use crate::error::CryptoError;
use crate::KEY_LEN;

/// ServerHello に載せる鍵確認値の長さ
pub const VERIFY_LEN: usize = 16;

/// HKDF-Expand の info
const SESSION_KEY_INFO: &[u8] = b"secpump session key";

/// 鍵確認値の計算に混ぜるラベル
const VERIFY_LABEL: &[u8] = b"secpump verify";

type HmacSha256 = Hmac<Sha256>;

/// 事前共有鍵と双方の乱数からセッション鍵を導出する
pub fn derive_session_key(
    psk: &[u8; KEY_LEN],
    client_random: &[u8; RANDOM_LEN],
    server_random: &[u8; RANDOM_LEN],
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut salt = [0u8; RANDOM_LEN * 2];
    salt[..RANDOM_LEN].copy_from_slice(client_random);
    salt[RANDOM_LEN..].copy_from_slice(server_random);

    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), psk);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let res = hk.expand(SESSION_KEY_INFO, &mut key[..]);
    debug_assert!(res.is_ok(), "HKDF expand cannot fail for a 16-byte output");
    key
}

/// ServerHello に載せる鍵確認値
///
/// 同じ PSK を持つ相手だけが同じ値を計算できる。
pub fn key_confirmation(
    session_key: &[u8; KEY_LEN],
    client_random: &[u8; RANDOM_LEN],
) -> Result<[u8; VERIFY_LEN], CryptoError> {
    let tag = confirmation_mac(session_key, client_random)?
        .finalize()
        .into_bytes();
    let mut out = [0u8; VERIFY_LEN];
    out.copy_from_slice(&tag[..VERIFY_LEN]);
    Ok(out)
}

/// 受け取った鍵確認値を検証する
///
/// 比較は定数時間で行う。長さが [`VERIFY_LEN`] でなければ不一致。
pub fn verify_key_confirmation(
    session_key: &[u8; KEY_LEN],
    client_random: &[u8; RANDOM_LEN],
    received: &[u8],
) -> Result<bool, CryptoError> {
    if received.len() != VERIFY_LEN {
        return Ok(false);
    }
    let mac = confirmation_mac(session_key, client_random)?;
    Ok(mac.verify_truncated_left(received).is_ok())
}

fn confirmation_mac(
    session_key: &[u8; KEY_LEN],
    client_random: &[u8; RANDOM_LEN],
) -> Result<HmacSha256, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(session_key)
        .map_err(|_| CryptoError::InvalidKeyLength(session_key.len()))?;
    mac.update(VERIFY_LABEL);
    mac.update(client_random);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sides_derive_same_key() {
        let psk = [7u8; KEY_LEN];
        let a = derive_session_key(&psk, &[1u8; 16], &[2u8; 16]);
        let b = derive_session_key(&psk, &[1u8; 16], &[2u8; 16]);
        assert_eq!(*a, *b);
        assert_ne!(*a, psk);
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let base = derive_session_key(&[7u8; KEY_LEN], &[1u8; 16], &[2u8; 16]);
        assert_ne!(*base, *derive_session_key(&[8u8; KEY_LEN], &[1u8; 16], &[2u8; 16]));
        assert_ne!(*base, *derive_session_key(&[7u8; KEY_LEN], &[3u8; 16], &[2u8; 16]));
        assert_ne!(*base, *derive_session_key(&[7u8; KEY_LEN], &[1u8; 16], &[3u8; 16]));
        // 乱数を入れ替えると別の鍵になる
        assert_ne!(*base, *derive_session_key(&[7u8; KEY_LEN], &[2u8; 16], &[1u8; 16]));
    }

    #[test]
    fn test_key_matches_hkdf_sha256() {
        let psk = [7u8; KEY_LEN];
        let mut salt = [1u8; 32];
        salt[16..].fill(2);
        let mut expected = [0u8; KEY_LEN];
        Hkdf::<Sha256>::new(Some(&salt[..]), &psk)
            .expand(b"secpump session key", &mut expected)
            .unwrap();

        assert_eq!(*derive_session_key(&psk, &[1u8; 16], &[2u8; 16]), expected);
    }

    #[test]
    fn test_confirmation_detects_psk_mismatch() {
        let right = derive_session_key(&[7u8; KEY_LEN], &[1u8; 16], &[2u8; 16]);
        let wrong = derive_session_key(&[9u8; KEY_LEN], &[1u8; 16], &[2u8; 16]);

        let sent = key_confirmation(&right, &[1u8; 16]).unwrap();
        assert_eq!(verify_key_confirmation(&right, &[1u8; 16], &sent), Ok(true));
        assert_eq!(verify_key_confirmation(&wrong, &[1u8; 16], &sent), Ok(false));
        assert_eq!(verify_key_confirmation(&right, &[4u8; 16], &sent), Ok(false));
        assert_eq!(verify_key_confirmation(&right, &[1u8; 16], &sent[..15]), Ok(false));
        assert_eq!(verify_key_confirmation(&right, &[1u8; 16], &[]), Ok(false));
    }
}
