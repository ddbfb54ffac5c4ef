//! Parsers for FastCGI records
//!
//! These work on complete input: callers read a whole record off the wire
//! (its header says how long it is) before handing it over.

use super::*;

use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::error::{Error, ErrorKind};
use nom::multi::many0;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::{Err, IResult};

/// The fixed eight bytes leading every record
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RecordHeader {
    pub version: u8,
    pub kind: u8,
    pub id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    /// Bytes following the header: content plus padding
    pub fn body_length(&self) -> usize {
        self.content_length as usize + self.padding_length as usize
    }
}

pub fn header(input: &[u8]) -> IResult<&[u8], RecordHeader> {
    let (input, version) = be_u8(input)?;
    let (input, kind) = be_u8(input)?;
    let (input, id) = be_u16(input)?;
    let (input, content_length) = be_u16(input)?;
    let (input, padding_length) = be_u8(input)?;
    let (input, _) = take(1usize)(input)?; // reserved byte

    Ok((input, RecordHeader {
        version,
        kind,
        id,
        content_length,
        padding_length,
    }))
}

pub fn record(input: &[u8]) -> IResult<&[u8], Record> {
    let (input, header) = header(input)?;
    let (input, content) = take(header.content_length)(input)?;
    let (rest, _) = take(header.padding_length)(input)?;

    let (_, parsed_content) = match header.kind {
        record_kind::BEGIN_REQUEST => begin_request(content)?,
        record_kind::ABORT_REQUEST => (content, Content::AbortRequest),
        record_kind::END_REQUEST => end_request(content)?,
        record_kind::PARAMS => (content, Content::Params(Vec::from(content))),
        record_kind::STDIN => (content, Content::Stdin(Vec::from(content))),
        record_kind::STDOUT => (content, Content::Stdout(Vec::from(content))),
        record_kind::STDERR => (content, Content::Stderr(Vec::from(content))),
        record_kind::DATA => (content, Content::Data(Vec::from(content))),
        record_kind::GET_VALUES => {
            let (i, pairs) = name_value_pairs(content)?;
            (i, Content::GetValues(pairs))
        }
        record_kind::GET_VALUES_RESULT => {
            let (i, pairs) = name_value_pairs(content)?;
            (i, Content::GetValuesResult(pairs))
        }
        record_kind::UNKNOWN_TYPE => unknown_type(content)?,
        _ => return Err(Err::Error(Error::new(rest, ErrorKind::Switch))),
    };

    Ok((rest, Record {
        id: header.id,
        content: parsed_content,
    }))
}

fn begin_request(input: &[u8]) -> IResult<&[u8], Content> {
    let (input, role) = role(input)?;
    let (input, flags) = be_u8(input)?;
    let (input, _) = take(5usize)(input)?;

    Ok((input, Content::BeginRequest(BeginRequest { role, flags })))
}

fn end_request(input: &[u8]) -> IResult<&[u8], Content> {
    let (input, app_status) = be_u32(input)?;
    let (input, protocol_status) = be_u8(input)?;
    let (input, _) = take(3usize)(input)?;

    Ok((input, Content::EndRequest(EndRequest {
        app_status,
        protocol_status,
    })))
}

fn unknown_type(input: &[u8]) -> IResult<&[u8], Content> {
    let (input, kind) = be_u8(input)?;
    let (input, _) = take(7usize)(input)?;

    Ok((input, Content::UnknownType(UnknownType(kind))))
}

fn role(input: &[u8]) -> IResult<&[u8], Role> {
    let (rest, tag) = be_u16(input)?;
    match Role::from_protocol_number(tag) {
        Some(role) => Ok((rest, role)),
        None => Err(Err::Error(Error::new(input, ErrorKind::Verify))),
    }
}

/// Lengths take one byte below 128 and four bytes, high bit set, above.
fn length(input: &[u8]) -> IResult<&[u8], u32> {
    let (_, first) = be_u8(input)?;
    if first >> 7 == 1 {
        let (input, length) = be_u32(input)?;
        Ok((input, length & 0x7fff_ffff))
    } else {
        let (input, length) = be_u8(input)?;
        Ok((input, u32::from(length)))
    }
}

pub fn name_value_pair(input: &[u8]) -> IResult<&[u8], NameValuePair> {
    let (input, name_length) = length(input)?;
    let (input, value_length) = length(input)?;
    let (input, name) = take(name_length)(input)?;
    let (input, value) = take(value_length)(input)?;

    Ok((input, NameValuePair {
        name: Vec::from(name),
        value: Vec::from(value),
    }))
}

pub fn name_value_pairs(input: &[u8]) -> IResult<&[u8], Vec<NameValuePair>> {
    all_consuming(many0(name_value_pair))(input)
}
