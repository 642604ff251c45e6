use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use shared::error::MainError;
use shared::point::PointRecord;
use thiserror::Error;

pub const MAX_CHUNK_SIZE: usize = 400;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid signing key")]
    InvalidKey,
    #[error("Failed to sign chunk {chunk}")]
    Signing {
        chunk: usize,
        #[source]
        source: k256::ecdsa::Error,
    },
    #[error("Failed to serialize chunk {chunk}")]
    Serialize {
        chunk: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to submit chunk {chunk}")]
    Request {
        chunk: usize,
        #[source]
        source: reqwest::Error,
    },
}

impl From<SubmitError> for MainError {
    fn from(error: SubmitError) -> Self {
        tracing::error!(reason = ?error, "Point submission failed");
        MainError::ExternalService
    }
}

/// Final sink of persisted point records.
#[async_trait]
pub trait PointSubmitter: Send + Sync {
    /// Returns the number of records accepted.
    async fn submit(
        &self,
        records: &[PointRecord],
    ) -> Result<usize, SubmitError>;
}

#[derive(Debug, Serialize)]
pub struct SignedChunk<'a> {
    pub data: &'a [PointRecord],
    pub signature: String,
}

/// Hex of the compact secp256k1 signature over `sha256(json(records))`.
pub fn sign_records(
    key: &SigningKey,
    records: &[PointRecord],
    chunk: usize,
) -> Result<String, SubmitError> {
    let json = serde_json::to_vec(records)
        .map_err(|source| SubmitError::Serialize { chunk, source })?;
    let digest = Sha256::digest(&json);
    let signature: Signature = key
        .sign_prehash(&digest)
        .map_err(|source| SubmitError::Signing { chunk, source })?;

    Ok(hex::encode(signature.to_bytes()))
}

pub struct SignedHttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
    key: SigningKey,
    chunk_size: usize,
}

impl SignedHttpSubmitter {
    /// `private_key` is hex, with or without `0x`.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        private_key: &str,
        chunk_size: usize,
    ) -> Result<Self, SubmitError> {
        let raw = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|_| SubmitError::InvalidKey)?;
        let key =
            SigningKey::from_slice(&raw).map_err(|_| SubmitError::InvalidKey)?;

        Ok(Self {
            client,
            endpoint,
            key,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        })
    }
}

#[async_trait]
impl PointSubmitter for SignedHttpSubmitter {
    async fn submit(
        &self,
        records: &[PointRecord],
    ) -> Result<usize, SubmitError> {
        for (chunk, data) in records.chunks(self.chunk_size).enumerate() {
            let signature = sign_records(&self.key, data, chunk)?;

            self.client
                .post(&self.endpoint)
                .json(&SignedChunk { data, signature })
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|source| SubmitError::Request { chunk, source })?;

            tracing::debug!(chunk, records = data.len(), "Submitted points");
        }

        Ok(records.len())
    }
}
