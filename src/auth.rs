//! MaxScale CDC 인증 처리
//!
//! 인증 메시지 형식 (구분자 없음):
//! hex("user:") + hex(SHA1(password))

/// `user:`의 hex 인코딩
pub fn encode_user(username: &str) -> String {
    hex::encode(format!("{}:", username))
}

/// SHA1(password)의 hex 인코딩
pub fn encode_password(password: &str) -> String {
    hex::encode(sha1(password.as_bytes()))
}

/// 전체 인증 메시지
pub fn create_auth_message(username: &str, password: &str) -> String {
    let mut message = encode_user(username);
    message.push_str(&encode_password(password));
    message
}

fn sha1(data: &[u8]) -> Vec<u8> {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}
