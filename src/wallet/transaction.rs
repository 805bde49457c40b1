//! Solana transaction wire format: just enough to sign what the aggregator builds.
//!
//! A serialized transaction is laid out as:
//!
//! ```text
//! compact-u16 signature count | 64-byte signatures | message
//! ```
//!
//! and the message starts with an optional version byte (`0x80 | version`),
//! a three-byte header, then `compact-u16 key count | 32-byte keys | ...`.
//! Only the header and the static account keys are needed to sign; the rest
//! of the message is carried through untouched.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::Wallet;

const SIGNATURE_LEN: usize = 64;
const PUBKEY_LEN: usize = 32;
const VERSION_PREFIX: u8 = 0x80;

/// Message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

/// Message format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

/// A serialized transaction split into signatures and message bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    signatures: Vec<[u8; SIGNATURE_LEN]>,
    message: Vec<u8>,
}

impl RawTransaction {
    /// Decode a base64 transaction as returned by the swap endpoint.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .context("Transaction is not valid base64")?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (count, mut offset) = decode_compact_u16(bytes)?;

        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            let end = offset + SIGNATURE_LEN;
            let slice = bytes
                .get(offset..end)
                .context("Transaction truncated inside signatures")?;
            let mut sig = [0u8; SIGNATURE_LEN];
            sig.copy_from_slice(slice);
            signatures.push(sig);
            offset = end;
        }

        let message = bytes[offset..].to_vec();
        if message.is_empty() {
            bail!("Transaction has no message");
        }

        let tx = Self { signatures, message };

        let header = tx.header()?;
        if header.num_required_signatures as usize != tx.signatures.len() {
            bail!(
                "Transaction has {} signature slots but message requires {}",
                tx.signatures.len(),
                header.num_required_signatures
            );
        }

        Ok(tx)
    }

    /// Re-serialize to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            3 + self.signatures.len() * SIGNATURE_LEN + self.message.len(),
        );
        encode_compact_u16(self.signatures.len(), &mut out);
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.message);
        out
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Raw message bytes (what gets signed).
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn signatures(&self) -> &[[u8; SIGNATURE_LEN]] {
        &self.signatures
    }

    pub fn version(&self) -> Result<MessageVersion> {
        let first = self.message[0];
        if first & VERSION_PREFIX == 0 {
            return Ok(MessageVersion::Legacy);
        }
        match first & !VERSION_PREFIX {
            0 => Ok(MessageVersion::V0),
            v => bail!("Unsupported transaction message version {}", v),
        }
    }

    fn header_offset(&self) -> Result<usize> {
        Ok(match self.version()? {
            MessageVersion::Legacy => 0,
            MessageVersion::V0 => 1,
        })
    }

    pub fn header(&self) -> Result<MessageHeader> {
        let offset = self.header_offset()?;
        let raw = self
            .message
            .get(offset..offset + 3)
            .context("Message truncated inside header")?;

        Ok(MessageHeader {
            num_required_signatures: raw[0],
            num_readonly_signed: raw[1],
            num_readonly_unsigned: raw[2],
        })
    }

    /// Static account keys listed in the message.
    pub fn account_keys(&self) -> Result<Vec<[u8; PUBKEY_LEN]>> {
        let start = self.header_offset()? + 3;
        let rest = self
            .message
            .get(start..)
            .context("Message truncated before account keys")?;
        let (count, mut offset) = decode_compact_u16(rest)?;

        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let end = offset + PUBKEY_LEN;
            let slice = rest
                .get(offset..end)
                .context("Message truncated inside account keys")?;
            let mut key = [0u8; PUBKEY_LEN];
            key.copy_from_slice(slice);
            keys.push(key);
            offset = end;
        }

        Ok(keys)
    }

    /// Keys whose signatures the message requires, in signature-slot order.
    pub fn required_signers(&self) -> Result<Vec<[u8; PUBKEY_LEN]>> {
        let required = self.header()?.num_required_signatures as usize;
        let keys = self.account_keys()?;
        if keys.len() < required {
            bail!(
                "Message lists {} account keys but requires {} signers",
                keys.len(),
                required
            );
        }
        Ok(keys[..required].to_vec())
    }

    /// Sign the message with `wallet` and return the transaction id.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<String> {
        let pubkey = wallet.pubkey_bytes();
        let slot = self
            .required_signers()?
            .iter()
            .position(|k| *k == pubkey)
            .with_context(|| {
                format!("Wallet {} is not a required signer of this transaction", wallet.pubkey())
            })?;

        self.signatures[slot] = wallet.sign_message(&self.message);

        self.transaction_id()
            .context("Signed transaction has no signatures")
    }

    /// Base58 of the first signature, which is the transaction id on chain.
    pub fn transaction_id(&self) -> Option<String> {
        self.signatures
            .first()
            .map(|sig| bs58::encode(sig).into_string())
    }
}

/// Decode a compact-u16 length prefix. Returns `(value, bytes consumed)`.
pub fn decode_compact_u16(bytes: &[u8]) -> Result<(usize, usize)> {
    let mut value = 0usize;
    for i in 0..3 {
        let byte = *bytes.get(i).context("Truncated compact-u16")?;
        value |= ((byte & 0x7f) as usize) << (i * 7);
        if byte & 0x80 == 0 {
            if value > u16::MAX as usize {
                bail!("compact-u16 value {} overflows", value);
            }
            return Ok((value, i + 1));
        }
    }
    bail!("compact-u16 longer than 3 bytes")
}

/// Append a compact-u16 length prefix.
pub fn encode_compact_u16(mut value: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

#[cfg(test)]
/// Build an unsigned transaction with the given signers followed by
/// `extra_keys` read-only keys and a dummy instruction tail.
pub(crate) fn unsigned_tx(versioned: bool, signers: &[[u8; 32]], extra_keys: usize) -> Vec<u8> {
    let mut message = Vec::new();
    if versioned {
        message.push(VERSION_PREFIX);
    }
    message.extend_from_slice(&[signers.len() as u8, 0, extra_keys as u8]);
    encode_compact_u16(signers.len() + extra_keys, &mut message);
    for key in signers {
        message.extend_from_slice(key);
    }
    for i in 0..extra_keys {
        message.extend_from_slice(&[100 + i as u8; 32]);
    }
    // recent blockhash + opaque instruction bytes
    message.extend_from_slice(&[9u8; 32]);
    message.extend_from_slice(&[1, 2, 3, 4, 5]);

    let mut tx = Vec::new();
    encode_compact_u16(signers.len(), &mut tx);
    for _ in signers {
        tx.extend_from_slice(&[0u8; 64]);
    }
    tx.extend_from_slice(&message);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn wallet(seed: u8) -> Wallet {
        Wallet::from_bytes(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_compact_u16_boundaries() {
        for (value, encoded) in [
            (0usize, vec![0x00]),
            (0x7f, vec![0x7f]),
            (0x80, vec![0x80, 0x01]),
            (0x3fff, vec![0xff, 0x7f]),
            (0x4000, vec![0x80, 0x80, 0x01]),
            (0xffff, vec![0xff, 0xff, 0x03]),
        ] {
            let mut out = Vec::new();
            encode_compact_u16(value, &mut out);
            assert_eq!(out, encoded, "encoding {}", value);
            assert_eq!(decode_compact_u16(&encoded).unwrap(), (value, encoded.len()));
        }
    }

    #[test]
    fn test_compact_u16_rejects_overlong() {
        assert!(decode_compact_u16(&[0x80, 0x80, 0x80, 0x01]).is_err());
        assert!(decode_compact_u16(&[0xff, 0xff, 0x7f]).is_err());
        assert!(decode_compact_u16(&[0x80]).is_err());
    }

    #[test]
    fn test_sign_v0_transaction() {
        let payer = wallet(1);
        let bytes = unsigned_tx(true, &[payer.pubkey_bytes()], 3);
        let mut tx = RawTransaction::from_base64(&STANDARD.encode(&bytes)).unwrap();

        assert_eq!(tx.version().unwrap(), MessageVersion::V0);
        assert_eq!(tx.account_keys().unwrap().len(), 4);

        let id = tx.sign(&payer).unwrap();
        assert_eq!(id, bs58::encode(tx.signatures()[0]).into_string());

        let vk = VerifyingKey::from_bytes(&payer.pubkey_bytes()).unwrap();
        let sig = Signature::from_bytes(&tx.signatures()[0]);
        assert!(vk.verify(tx.message(), &sig).is_ok());

        // message is untouched and survives re-encoding
        let reparsed = RawTransaction::from_base64(&tx.to_base64()).unwrap();
        assert_eq!(reparsed, tx);
        assert_eq!(&reparsed.to_bytes()[1 + 64..], &bytes[1 + 64..]);
    }

    #[test]
    fn test_sign_fills_matching_slot_only() {
        let other = wallet(2);
        let payer = wallet(3);
        let bytes = unsigned_tx(false, &[other.pubkey_bytes(), payer.pubkey_bytes()], 1);
        let mut tx = RawTransaction::from_bytes(&bytes).unwrap();

        assert_eq!(tx.version().unwrap(), MessageVersion::Legacy);
        tx.sign(&payer).unwrap();

        assert_eq!(tx.signatures()[0], [0u8; 64]);
        assert_ne!(tx.signatures()[1], [0u8; 64]);
    }

    #[test]
    fn test_sign_rejects_non_signer() {
        let payer = wallet(4);
        let stranger = wallet(5);
        let mut tx = RawTransaction::from_bytes(&unsigned_tx(true, &[payer.pubkey_bytes()], 2)).unwrap();
        let err = tx.sign(&stranger).unwrap_err();
        assert!(err.to_string().contains("not a required signer"));
    }

    #[test]
    fn test_rejects_malformed() {
        let payer = wallet(6);
        let bytes = unsigned_tx(true, &[payer.pubkey_bytes()], 1);

        // cut inside the signature block
        assert!(RawTransaction::from_bytes(&bytes[..40]).is_err());

        // signature slots disagree with the header
        let mut wrong = bytes.clone();
        wrong[1 + 64 + 1] = 2;
        assert!(RawTransaction::from_bytes(&wrong).is_err());

        // unknown message version
        let mut v1 = bytes.clone();
        v1[1 + 64] = VERSION_PREFIX | 1;
        assert!(RawTransaction::from_bytes(&v1).is_err());

        assert!(RawTransaction::from_base64("%%%").is_err());
    }
}
