//! Serialization of FastCGI messages

use crate::cgi::Params;
use crate::errors::TransportError;
use crate::fastcgi::{record_kind, Role, MAX_CONTENT_LEN, VERSION};

use byteorder::{BigEndian, WriteBytesExt};

use std::io::Write;

type Result<T> = std::result::Result<T, TransportError>;

/// Writes a header from its bits
///
/// If succesful, returns the number of bytes of padding we told the other end
/// of the connection we were going to write.
fn write_header<W: Write>(mut output: W, kind: u8, id: u16, content_length: usize) -> Result<u8> {
    if content_length > MAX_CONTENT_LEN {
        return Err(TransportError::TooLong);
    }

    let padding_length = if content_length % 8 == 0 {
        0
    } else {
        8 - content_length % 8
    };

    output.write_all(&[VERSION, kind])?;
    output.write_u16::<BigEndian>(id)?;
    output.write_u16::<BigEndian>(content_length as u16)?;
    output.write_u8(padding_length as u8)?;
    output.write_u8(0)?; // reserved byte

    Ok(padding_length as u8)
}

/// Writes one complete record
fn write_record<W: Write>(mut output: W, kind: u8, id: u16, content: &[u8]) -> Result<()> {
    let padding_length = write_header(&mut output, kind, id, content.len())?;
    output.write_all(content)?;
    output.write_all(&[0; 8][..padding_length as usize])?;

    Ok(())
}

/// Computes the number of bytes a name or value will take up on the wire once
/// serialized into the FastCGI name-value pair format
fn name_length(val: &[u8]) -> usize {
    let length = val.len();
    let length_length = if length > 127 { 4 } else { 1 };

    length + length_length
}

fn write_length<W: Write>(mut output: W, length: usize) -> Result<()> {
    if length > 0x7fff_ffff {
        return Err(TransportError::TooLong);
    }

    if length > 127 {
        output.write_u32::<BigEndian>(length as u32 | 0x8000_0000)?;
    } else {
        output.write_u8(length as u8)?;
    }

    Ok(())
}

/// Writes a name-value pair to the stream
fn write_name_val_pair<W: Write>(mut output: W, name: &[u8], val: &[u8]) -> Result<()> {
    write_length(&mut output, name.len())?;
    write_length(&mut output, val.len())?;
    output.write_all(name)?;
    output.write_all(val)?;

    Ok(())
}

/// Encodes name-value pairs into one buffer
pub fn name_value_pairs<'a, I>(pairs: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut buffer = Vec::new();
    for (name, value) in pairs {
        buffer.reserve(name_length(name) + name_length(value));
        write_name_val_pair(&mut buffer, name, value)?;
    }

    Ok(buffer)
}

/// Write a `BeginRequest` message
pub fn begin_request<W: Write>(mut output: W, id: u16, role: Role, flags: u8) -> Result<()> {
    let mut content = Vec::with_capacity(8);
    content.write_u16::<BigEndian>(role.to_protocol_number())?;
    content.write_u8(flags)?;
    content.write_all(&[0; 5])?; // reserved

    write_record(&mut output, record_kind::BEGIN_REQUEST, id, &content)
}

/// Write a whole stream of the given kind
///
/// The content is split across as many records as it takes, followed by the
/// empty record that ends the stream.
pub fn stream<W: Write>(mut output: W, kind: u8, id: u16, content: &[u8]) -> Result<()> {
    for chunk in content.chunks(MAX_CONTENT_LEN) {
        write_record(&mut output, kind, id, chunk)?;
    }

    write_record(&mut output, kind, id, &[])
}

/// Write a stream of parameters
///
/// This will automatically emit the stream-terminating empty message as well.
pub fn params<W: Write>(output: W, id: u16, params: &Params) -> Result<()> {
    let encoded = name_value_pairs(
        params
            .iter()
            .map(|(name, value)| (name.as_bytes(), value.as_bytes())),
    )?;

    stream(output, record_kind::PARAMS, id, &encoded)
}

/// Writes a `GetValues` record to the output stream
pub fn get_values<W: Write>(output: W, get_for: &[&[u8]]) -> Result<()> {
    let content = name_value_pairs(get_for.iter().map(|&name| (name, &b""[..])))?;

    write_record(output, record_kind::GET_VALUES, 0, &content)
}

/// Writes the answer to a `GetValues` record
pub fn get_values_result<W: Write>(output: W, values: &[(&[u8], &[u8])]) -> Result<()> {
    let content = name_value_pairs(values.iter().copied())?;

    write_record(output, record_kind::GET_VALUES_RESULT, 0, &content)
}

/// Write the `EndRequest` record closing a request
pub fn end_request<W: Write>(output: W, id: u16, app_status: u32, protocol_status: u8) -> Result<()> {
    let mut content = Vec::with_capacity(8);
    content.write_u32::<BigEndian>(app_status)?;
    content.write_u8(protocol_status)?;
    content.write_all(&[0; 3])?; // reserved

    write_record(output, record_kind::END_REQUEST, id, &content)
}
