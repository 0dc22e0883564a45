use crate::errors::{CeremonyError, Result};
use nom::{
    bytes::complete::take,
    number::complete::{le_u32, le_u64},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const HEADER_SECTION: u32 = 1;

/// Header of a circom R1CS file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct R1csHeader {
    pub version: u32,
    pub field_size: u32,
    pub prime: Vec<u8>,
    pub wires: u32,
    pub public_outputs: u32,
    pub public_inputs: u32,
    pub private_inputs: u32,
    pub labels: u64,
    pub constraints: u32,
}

impl R1csHeader {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let (_, header) =
            parse_r1cs(data).map_err(|e| CeremonyError::R1cs(format!("{e:?}")))?;
        Ok(header)
    }

    pub fn stats(&self) -> CircuitStats {
        CircuitStats {
            constraints: self.constraints as u64,
            wires: self.wires as u64,
            public_outputs: self.public_outputs as u64,
            public_inputs: self.public_inputs as u64,
            private_inputs: self.private_inputs as u64,
        }
    }
}

/// Circuit dimensions reported after compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitStats {
    pub constraints: u64,
    pub wires: u64,
    pub public_outputs: u64,
    pub public_inputs: u64,
    pub private_inputs: u64,
}

impl CircuitStats {
    /// Public signals seen by a verifier: outputs first, then public inputs
    pub fn public_signals(&self) -> u64 {
        self.public_outputs + self.public_inputs
    }

    /// Smallest Powers of Tau exponent whose domain holds the circuit.
    /// Setup adds one constraint per public signal plus one more, so an
    /// exact power of two spills into the next tier.
    pub fn required_power(&self) -> u32 {
        bit_length(self.constraints + self.public_signals()).max(1)
    }
}

impl fmt::Display for CircuitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constraints, {} wires, {} public outputs, {} public inputs, {} private inputs",
            self.constraints,
            self.wires,
            self.public_outputs,
            self.public_inputs,
            self.private_inputs
        )
    }
}

fn bit_length(n: u64) -> u32 {
    64 - n.leading_zeros()
}

fn parse_r1cs(input: &[u8]) -> IResult<&[u8], R1csHeader> {
    // magic "r1cs", version u32, section count u32, then (type u32, size u64, data)*
    let (input, magic) = take(4usize)(input)?;
    if magic != b"r1cs" {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (input, version) = le_u32(input)?;
    let (mut input, sections) = le_u32(input)?;

    for _ in 0..sections {
        let (rest, section_type) = le_u32(input)?;
        let (rest, section_size) = le_u64(rest)?;
        if section_size > rest.len() as u64 {
            return Err(nom::Err::Error(nom::error::Error::new(
                rest,
                nom::error::ErrorKind::TooLarge,
            )));
        }
        let (rest, section) = take(section_size)(rest)?;
        if section_type == HEADER_SECTION {
            let (_, header) = parse_header_section(section, version)?;
            return Ok((rest, header));
        }
        input = rest;
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Eof,
    )))
}

fn parse_header_section(input: &[u8], version: u32) -> IResult<&[u8], R1csHeader> {
    let (input, field_size) = le_u32(input)?;
    let (input, prime) = take(field_size)(input)?;
    let (input, wires) = le_u32(input)?;
    let (input, public_outputs) = le_u32(input)?;
    let (input, public_inputs) = le_u32(input)?;
    let (input, private_inputs) = le_u32(input)?;
    let (input, labels) = le_u64(input)?;
    let (input, constraints) = le_u32(input)?;

    Ok((
        input,
        R1csHeader {
            version,
            field_size,
            prime: prime.to_vec(),
            wires,
            public_outputs,
            public_inputs,
            private_inputs,
            labels,
            constraints,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(constraints: u32, outputs: u32, inputs: u32) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&32u32.to_le_bytes());
        section.extend_from_slice(&[0xAB; 32]);
        section.extend_from_slice(&20u32.to_le_bytes());
        section.extend_from_slice(&outputs.to_le_bytes());
        section.extend_from_slice(&inputs.to_le_bytes());
        section.extend_from_slice(&3u32.to_le_bytes());
        section.extend_from_slice(&25u64.to_le_bytes());
        section.extend_from_slice(&constraints.to_le_bytes());

        let mut data = b"r1cs".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        // a non-header section first, as circom may order them either way
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&4u64.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&HEADER_SECTION.to_le_bytes());
        data.extend_from_slice(&(section.len() as u64).to_le_bytes());
        data.extend_from_slice(&section);
        data
    }

    #[test]
    fn test_parse_header() {
        let header = R1csHeader::parse(&header_bytes(1500, 1, 3)).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.field_size, 32);
        assert_eq!(header.constraints, 1500);
        assert_eq!(header.public_outputs, 1);
        assert_eq!(header.public_inputs, 3);
        assert_eq!(header.private_inputs, 3);
        assert_eq!(header.labels, 25);

        let stats = header.stats();
        assert_eq!(stats.public_signals(), 4);
        assert_eq!(stats.required_power(), 11);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = header_bytes(10, 0, 3);
        data[0] = b'x';
        assert!(matches!(R1csHeader::parse(&data), Err(CeremonyError::R1cs(_))));
    }

    #[test]
    fn test_rejects_truncated_section() {
        let data = header_bytes(10, 0, 3);
        assert!(R1csHeader::parse(&data[..data.len() - 8]).is_err());
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(1023), 10);
        assert_eq!(bit_length(1024), 11);
    }

    #[test]
    fn test_required_power_at_domain_boundary() {
        let stats = |constraints| CircuitStats {
            constraints,
            wires: constraints + 1,
            public_outputs: 0,
            public_inputs: 3,
            private_inputs: 3,
        };
        assert_eq!(stats(1020).required_power(), 10);
        assert_eq!(stats(1021).required_power(), 11);
        assert_eq!(stats(0).required_power(), 2);
    }
}
