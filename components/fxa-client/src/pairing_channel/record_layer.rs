/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use anyhow::Result;
use rc_crypto::{
    aead,
    aead::{OpeningKey, SealingKey, AES_128_GCM},
    digest, hkdf, hmac,
};
use std::convert::TryFrom;
use std::convert::TryInto;

// Encrypting at most 2^24 records will force us to stay
// below data limits on AES-GCM encryption key use,
const MAX_SEQUENCE_NUMBER: u32 = 16_777_216; // 2^24
const MAX_RECORD_SIZE: u16 = 16_384; // 2^14
const RECORD_HEADER_SIZE: usize = 5;
const AEAD_SIZE_INFLATION: usize = 16;
const VERSION_TLS_1_2: u16 = 0x0303;
const VERSION_TLS_1_0: u16 = 0x0301;
const MAX_ENCRYPTED_RECORD_SIZE: u16 = MAX_RECORD_SIZE + 256;

#[derive(PartialEq, Copy, Clone, Debug)]
pub enum RecordType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl TryFrom<u8> for RecordType {
    type Error = anyhow::Error;
    fn try_from(num: u8) -> Result<RecordType> {
        Ok(match num {
            20 => RecordType::ChangeCipherSpec,
            21 => RecordType::Alert,
            22 => RecordType::Handshake,
            23 => RecordType::ApplicationData,
            _ => anyhow::bail!("Invalid record type"),
        })
    }
}

impl Into<u8> for RecordType {
    fn into(self) -> u8 {
        match self {
            RecordType::ChangeCipherSpec => 20,
            RecordType::Alert => 21,
            RecordType::Handshake => 22,
            RecordType::ApplicationData => 23,
        }
    }
}

pub struct Encryptor {
    key: SealingKey,
    iv: Vec<u8>,
    seq_num: u32,
}

impl Encryptor {
    fn new(key: &[u8]) -> Result<Self> {
        let signing_key = hmac::SigningKey::new(&digest::Algorithm::SHA256, key);
        let key = hkdf::expand_label(&signing_key, "key", b"", 16)?;
        let key = SealingKey::new(&AES_128_GCM, &key)?;
        let empty = vec![0u8; 0];
        let iv = hkdf::expand_label(&signing_key, "iv", &empty, 12)?;
        Ok(Self {
            key,
            iv,
            seq_num: 0,
        })
    }

    fn nonce(&mut self) -> Result<Vec<u8>> {
        let nonce = get_nonce(&self.iv, self.seq_num)?;
        self.seq_num += 1;
        if self.seq_num > MAX_SEQUENCE_NUMBER {
            anyhow::bail!("Internal error: Sequence number too high");
        }
        Ok(nonce)
    }

    fn encrypt(&mut self, plaintext: &[u8], additional_data: &[u8]) -> Result<Vec<u8>> {
        let additional_data = aead::Aad::from(additional_data);
        let nonce = aead::Nonce::try_assume_unique_for_key(&AES_128_GCM, &self.nonce()?)?;
        let encrypted = aead::seal(&self.key, nonce, additional_data, plaintext)?;
        Ok(encrypted)
    }
}

pub struct Decryptor {
    key: OpeningKey,
    iv: Vec<u8>,
    seq_num: u32,
}

impl Decryptor {
    fn new(key: &[u8]) -> Result<Self> {
        let signing_key = hmac::SigningKey::new(&digest::Algorithm::SHA256, key);
        let key = hkdf::expand_label(&signing_key, "key", b"", 16)?;
        let key = OpeningKey::new(&AES_128_GCM, &key)?;
        let iv = hkdf::expand_label(&signing_key, "iv", b"", 12)?;
        Ok(Self {
            key,
            iv,
            seq_num: 0,
        })
    }

    fn nonce(&mut self) -> Result<Vec<u8>> {
        let nonce = get_nonce(&self.iv, self.seq_num)?;
        self.seq_num += 1;
        if self.seq_num > MAX_SEQUENCE_NUMBER {
            anyhow::bail!("Internal error: Sequence number too high");
        }
        Ok(nonce)
    }

    fn decrypt(&mut self, ciphertext: &[u8], additional_data: &[u8]) -> Result<Vec<u8>> {
        let additional_data = aead::Aad::from(additional_data);
        let nonce = aead::Nonce::try_assume_unique_for_key(&AES_128_GCM, &self.nonce()?)?;
        let decrypted = aead::open(&self.key, nonce, additional_data, ciphertext)?;
        Ok(decrypted)
    }
}

// Ref https://tools.ietf.org/html/rfc8446#section-5.3:
// * left-pad the sequence number with zeros to IV_LENGTH
// * xor with the provided iv
// Our sequence numbers are always less than 2^24, so fit in a Uint32
// in the last 4 bytes of the nonce.
fn get_nonce(iv: &[u8], seq_num: u32) -> Result<Vec<u8>> {
    let nonce = iv;
    let last_bytes = nonce
        .get(nonce.len() - 4..)
        .ok_or_else(|| anyhow::Error::msg("Invalid iv"))?;
    let last_bytes: [u8; 4] = last_bytes.try_into()?;
    let last_bytes = u32::from_be_bytes(last_bytes);
    let to_replace_with = last_bytes ^ seq_num;
    let mut nonce = nonce
        .get(..nonce.len() - 4)
        .ok_or_else(|| anyhow::Error::msg("Invalid nonce"))?
        .to_vec();
    nonce.extend_from_slice(&to_replace_with.to_be_bytes());
    Ok(nonce)
}

///
/// This implements the "record layer" for TLS1.3, as defined in
/// https://tools.ietf.org/html/rfc8446#section-5.
///
/// The record layer is responsible for encrypting/decrypting bytes to be
/// sent over the wire, including stateful management of sequence numbers
/// for the incoming and outgoing stream.
///
/// The main interface is the RecordLayer struct, which takes a callback function
/// sending data and can be used like so:
///
///    let rl = RecordLayer::new(|data| {
///      // application-specific sending logic here.
///    });
///
///    // Records are sent and received in plaintext by default,
///    // until you specify the key to use.
///    rl.set_send_key(key)
///
///    // Send some data by specifying the record type and the bytes.
///    // Where allowed by the record type, it will be buffered until
///    // explicitly flushed, and then sent by calling the callback.
///    rl.send(RecordType::Handshake, <bytes for a handshake message>)?;
///    rl.send(RecordType::handshake, <bytes for another handshake message>)?;
///    rl.flush()?;
///
///    // Separate keys are used for sending and receiving.
///    rl.set_recv_key(key);
///
///    // When data is received, push it into the RecordLayer
///    // [type, bytes] will be returned
///    // pair for each message parsed from the data.
///    let (type, bytes) = rl.recv(data_received_from_peer)?;
pub struct RecordLayer<F: FnMut(&[u8]) -> Result<()>> {
    send_callback: F,
    send_encryption_state: Option<Encryptor>,
    // Add send_error
    recv_decryption_state: Option<Decryptor>,
    pending_state: Option<(RecordType, Vec<u8>)>,
}

impl<F: FnMut(&[u8]) -> Result<()>> RecordLayer<F> {
    pub fn new(send_callback: F) -> Self {
        Self {
            send_callback,
            send_encryption_state: None,
            recv_decryption_state: None,
            pending_state: None,
        }
    }

    pub fn set_send_key(&mut self, key: &[u8]) -> Result<()> {
        self.flush()?;
        self.send_encryption_state = Some(Encryptor::new(key)?);
        Ok(())
    }

    pub fn set_recv_key(&mut self, key: &[u8]) -> Result<()> {
        self.recv_decryption_state = Some(Decryptor::new(key)?);
        Ok(())
    }

    #[allow(dead_code)]
    pub fn set_send_error(_: &str) -> Result<()> {
        unimplemented!();
    }

    #[allow(dead_code)]
    pub fn set_recv_error(_: &str) -> Result<()> {
        unimplemented!();
    }

    pub fn send(&mut self, record_type: RecordType, data: &[u8]) -> Result<()> {
        // TODO: Check for send_err

        // Forbid sending data that doesn't fit into a single record.
        // We do not support fragmentation over multiple records.
        let len: u16 = data.len().try_into()?;
        if len > MAX_RECORD_SIZE {
            anyhow::bail!("Cannot fit data in record");
        }

        // Flush if we're switching to a different record type.
        if let Some((pending_type, pending_buf)) = &self.pending_state {
            if record_type != *pending_type
                || (pending_buf.len() + data.len()) as u16 > MAX_RECORD_SIZE
            {
                self.flush()?;
            }
        }

        // Start a new pending record if necessary.
        // We reserve space at the start of the buffer for the record header,
        // which is conveniently always a fixed size.
        if self.pending_state.is_none() {
            let mut buf = Vec::new();
            let zeros_header = vec![0u8; RECORD_HEADER_SIZE];
            buf.extend_from_slice(&zeros_header);
            self.pending_state = Some((record_type, buf));
        }
        if let Some((_, record_buf)) = &mut self.pending_state {
            record_buf.extend_from_slice(data);
        } else {
            anyhow::bail!("Somehow the buffer is not there! Impossible!")
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some((record_type, buf)) = &mut self.pending_state {
            // Add send_error checking here!!!
            let mut record_type: u8 = (*record_type).into();
            let mut buf = buf.clone();

            // If we're encrypting, turn the existing buffer contents into a `TLSInnerPlaintext` by
            // appending the type. We don't do any zero-padding, although the spec allows it.
            let mut inflation = 0;
            let mut inner_plain_text = None;
            if self.send_encryption_state.is_some() {
                buf.extend_from_slice(&record_type.to_be_bytes());
                inner_plain_text = Some(buf[RECORD_HEADER_SIZE..].to_vec());
                inflation = AEAD_SIZE_INFLATION;
                record_type = RecordType::ApplicationData.into();
            }

            // Write the common header for either `TLSPlaintext` or `TLSCiphertext` record.
            let len = buf.len() - RECORD_HEADER_SIZE + inflation;
            let record_type = (record_type as u8).to_be_bytes();
            let version = VERSION_TLS_1_2.to_be_bytes();
            let length = (len as u16).to_be_bytes();
            let buf_iter = record_type
                .iter()
                .chain(version.iter())
                .chain(length.iter());

            // Followed by different payload depending on encryption status.
            let data = if let Some(encyption_state) = &mut self.send_encryption_state {
                let additional_data: Vec<u8> = buf_iter.clone().cloned().collect();
                encyption_state.encrypt(&inner_plain_text.unwrap(), &additional_data)?
            } else {
                buf[RECORD_HEADER_SIZE..].to_vec()
            };
            buf = buf_iter.chain(data.iter()).cloned().collect();
            self.pending_state = None;
            (self.send_callback)(&buf)
        } else {
            // If there's nothing to flush, bail out early.
            Ok(())
        }
    }

    pub fn recv(&mut self, data: &[u8]) -> Result<(RecordType, Vec<u8>)> {
        // For simplicity, we assume that the given data contains exactly one record.
        // Peers using this library will send one record at a time over the websocket
        // connection, and we can assume that the server-side websocket bridge will split
        // up any traffic into individual records if we ever start interoperating with
        // peers using a different TLS implementation.
        // Similarly, we assume that handshake messages will not be fragmented across
        // multiple records. This should be trivially true for the PSK-only mode used
        // by this library, but we may want to relax it in future for interoperability
        // with e.g. large ClientHello messages that contain lots of different options.

        // The data to read is either a TLSPlaintext or TLSCiphertext struct,
        // depending on whether record protection has been enabled yet:
        //
        //    struct {
        //        ContentType type;
        //        ProtocolVersion legacy_record_version;
        //        uint16 length;
        //        opaque fragment[TLSPlaintext.length];
        //    } TLSPlaintext;
        //
        //    struct {
        //        ContentType opaque_type = application_data; /* 23 */
        //        ProtocolVersion legacy_record_version = 0x0303; /* TLS v1.2 */
        //        uint16 length;
        //        opaque encrypted_record[TLSCiphertext.length];
        //    } TLSCiphertext;
        //
        let mut pos = 0;
        let record_type: RecordType = data[pos].try_into()?;
        pos += 1;
        // The spec says legacy_record_version "MUST be ignored for all purposes",
        // but we know TLS1.3 implementations will only ever emit two possible values,
        // so it seems useful to bail out early if we receive anything else.
        let version = read_u16(data, pos)?;
        pos += 2;
        if version != VERSION_TLS_1_2
            && (self.recv_decryption_state.is_some() || version != VERSION_TLS_1_0)
        {
            anyhow::bail!("Internal error: Version is not supported")
        }
        let length = read_u16(data, pos)?;
        pos += 2;
        if self.recv_decryption_state.is_none() || record_type == RecordType::ChangeCipherSpec {
            self.read_plaintext_record(record_type, length, data, pos)
        } else {
            self.read_encrypted_record(record_type, length, data, pos)
        }
    }

    fn read_plaintext_record(
        &mut self,
        record_type: RecordType,
        length: u16,
        data: &[u8],
        pos: usize,
    ) -> Result<(RecordType, Vec<u8>)> {
        if length > MAX_RECORD_SIZE as u16 || data.len() - pos < length as usize {
            anyhow::bail!("Length is greater than a record!");
        }
        if data.len() > length as usize + RECORD_HEADER_SIZE {
            anyhow::bail!("Extra bytes after record");
        }
        Ok((record_type, (&data[pos..pos + length as usize]).to_vec()))
    }

    fn read_encrypted_record(
        &mut self,
        record_type: RecordType,
        length: u16,
        data: &[u8],
        pos: usize,
    ) -> Result<(RecordType, Vec<u8>)> {
        if length > MAX_ENCRYPTED_RECORD_SIZE || data.len() - pos < length as usize {
            anyhow::bail!("Encrypted record too large!");
        }
        if record_type != RecordType::ApplicationData {
            anyhow::bail!("Decode error: Type should be application data");
        }
        if data.len() > length as usize + RECORD_HEADER_SIZE {
            anyhow::bail!("Extra bytes after record");
        }
        // Decrypt and decode the contained `TLSInnerPlaintext` struct:
        //
        //    struct {
        //        opaque content[TLSPlaintext.length];
        //        ContentType type;
        //        uint8 zeros[length_of_padding];
        //    } TLSInnerPlaintext;
        //
        // The additional data for the decryption is the `TLSCiphertext` record
        // header, which is a fixed size and immediately prior to current buffer position.
        let mut pos = pos - RECORD_HEADER_SIZE;
        let additional_data = &data[pos..pos + RECORD_HEADER_SIZE];
        pos += RECORD_HEADER_SIZE;
        let ciphertext = &data[pos..pos + length as usize];
        if let Some(decrypt_state) = &mut self.recv_decryption_state {
            let padded_plain_text = decrypt_state.decrypt(ciphertext, additional_data)?;
            let (i, record_type) = padded_plain_text
                .iter()
                .enumerate()
                .rev()
                .find(|(_, &val)| val != 0)
                .ok_or_else(|| anyhow::Error::msg("No type found!"))?;
            let record_type: RecordType = (*record_type).try_into()?;
            if record_type == RecordType::ChangeCipherSpec {
                anyhow::bail!("Change Cipher Spec must be in plaintext!");
            }
            return Ok((record_type, (&padded_plain_text[..i]).to_vec()));
        }
        anyhow::bail!("Decrypt state does not exist!")
    }
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    let res: [u8; 2] = (&data[pos..pos + 2]).try_into()?;
    Ok(u16::from_be_bytes(res))
}
