use crate::{analyzer, config::Analysis, crypto, report::AnalysisReport};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Routing tag; each kind runs on its own pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    AnalyzeFile,
    Encrypt,
    Hash,
}

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub buffer: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct EncryptRequest {
    pub plaintext: Vec<u8>,
    pub key_hex: String,
    pub iv_hex: String,
}

#[derive(Debug, Clone)]
pub struct DecryptRequest {
    pub ciphertext_hex: String,
    pub key_hex: String,
    pub iv_hex: String,
    pub tag_hex: String,
}

#[derive(Debug, Clone)]
pub struct EncryptFileRequest {
    pub contents: Vec<u8>,
    pub key_hex: String,
}

#[derive(Debug, Clone)]
pub struct HmacRequest {
    pub data: Vec<u8>,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct VerifyHmacRequest {
    pub data: Vec<u8>,
    pub signature_hex: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct HashRequest {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HashPasswordRequest {
    pub password: String,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub struct VerifyPasswordRequest {
    pub password: String,
    pub hash: String,
}

/// A unit of submitted work. The payload moves into the worker that runs it.
#[derive(Debug, Clone)]
pub enum Job {
    AnalyzeFile(AnalyzeRequest),
    Encrypt(EncryptRequest),
    Decrypt(DecryptRequest),
    EncryptFile(EncryptFileRequest),
    Hmac(HmacRequest),
    VerifyHmac(VerifyHmacRequest),
    Hash(HashRequest),
    HashPassword(HashPasswordRequest),
    VerifyPassword(VerifyPasswordRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobOutput {
    Report(AnalysisReport),
    Sealed(crypto::Sealed),
    SealedFile(crypto::SealedFile),
    Plaintext(Vec<u8>),
    Digest(String),
    Mac(String),
    PasswordHash(String),
    Verified(bool),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::AnalyzeFile(_) => JobKind::AnalyzeFile,
            Job::Encrypt(_)
            | Job::Decrypt(_)
            | Job::EncryptFile(_)
            | Job::Hmac(_)
            | Job::VerifyHmac(_) => JobKind::Encrypt,
            Job::Hash(_) | Job::HashPassword(_) | Job::VerifyPassword(_) => JobKind::Hash,
        }
    }

    /// Runs on a worker thread.
    pub fn execute(self, cfg: &Analysis) -> Result<JobOutput> {
        match self {
            Job::AnalyzeFile(req) => Ok(JobOutput::Report(analyzer::analyze(
                cfg,
                &req.buffer,
                &req.filename,
                &req.mime_type,
            ))),
            Job::Encrypt(req) => {
                crypto::encrypt(&req.plaintext, &req.key_hex, &req.iv_hex).map(JobOutput::Sealed)
            }
            Job::Decrypt(req) => crypto::decrypt(
                &req.ciphertext_hex,
                &req.key_hex,
                &req.iv_hex,
                &req.tag_hex,
            )
            .map(JobOutput::Plaintext),
            Job::EncryptFile(req) => {
                crypto::encrypt_file(&req.contents, &req.key_hex).map(JobOutput::SealedFile)
            }
            Job::Hmac(req) => crypto::hmac_hex(&req.data, &req.secret).map(JobOutput::Mac),
            Job::VerifyHmac(req) => {
                crypto::verify_hmac(&req.data, &req.signature_hex, &req.secret)
                    .map(JobOutput::Verified)
            }
            Job::Hash(req) => Ok(JobOutput::Digest(crypto::sha256_hex(&req.data))),
            Job::HashPassword(req) => {
                crypto::hash_password(&req.password, req.cost).map(JobOutput::PasswordHash)
            }
            Job::VerifyPassword(req) => {
                crypto::verify_password(&req.password, &req.hash).map(JobOutput::Verified)
            }
        }
    }
}
