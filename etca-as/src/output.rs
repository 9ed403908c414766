//! The emission buffer and the assembly result contract.

use crate::error::Error;

/// One committed emission: the unmasked placement counter, the encoded
/// bytes, and the source line that produced them.
///
/// An empty byte string is a real entry; it records a line (label, `.set`)
/// in the listing without advancing the address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionOutput {
    /// Unmasked internal counter at placement time.
    pub start_ip: u64,
    /// Encoded bytes.
    pub binary: Vec<u8>,
    /// The source line, verbatim.
    pub raw_line: String,
}

/// The stable outcome of [`Assembler::n_pass`](crate::Assembler::n_pass).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblyResult {
    /// Emissions in source order.
    pub output: Vec<InstructionOutput>,
    /// Visible address width in bits, from the final `ip_mask`.
    pub max_address_width: u32,
    /// Byte used to fill alignment and `.org` gaps when flattening.
    pub fill_value: u8,
}

impl AssemblyResult {
    fn address_mask(&self) -> u64 {
        if self.max_address_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.max_address_width) - 1
        }
    }

    /// The emissions with synthetic fill entries inserted wherever the
    /// address jumps forward. Addresses compare masked to the visible width;
    /// a backward placement is an error.
    ///
    /// `starting_at` anchors the walk at a fixed address instead of the first
    /// entry's.
    pub fn output_with_aligns(&self, starting_at: Option<u64>) -> Result<Vec<InstructionOutput>, Error> {
        let mask = self.address_mask();
        let mut ip = match starting_at {
            Some(address) => address & mask,
            None => match self.output.first() {
                Some(first) => first.start_ip & mask,
                None => return Ok(Vec::new()),
            },
        };
        let mut entries = Vec::with_capacity(self.output.len());
        for entry in &self.output {
            let address = entry.start_ip & mask;
            if address > ip {
                let gap = (address - ip) as usize;
                entries.push(InstructionOutput {
                    start_ip: ip,
                    binary: vec![self.fill_value; gap],
                    raw_line: String::new(),
                });
                ip = address;
            } else if address < ip {
                return Err(Error::Placement {
                    found: address,
                    expected: ip,
                });
            }
            entries.push(entry.clone());
            ip += entry.binary.len() as u64;
        }
        Ok(entries)
    }

    /// Flatten the output to raw bytes, gaps filled with the fill byte.
    pub fn to_bytes(&self, starting_at: Option<u64>) -> Result<Vec<u8>, Error> {
        Ok(self
            .output_with_aligns(starting_at)?
            .into_iter()
            .flat_map(|entry| entry.binary)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start_ip: u64, binary: &[u8]) -> InstructionOutput {
        InstructionOutput {
            start_ip,
            binary: binary.to_vec(),
            raw_line: String::new(),
        }
    }

    fn result(output: Vec<InstructionOutput>) -> AssemblyResult {
        AssemblyResult {
            output,
            max_address_width: 16,
            fill_value: 0,
        }
    }

    #[test]
    fn fills_forward_gaps() {
        let result = result(vec![entry(0x8000, &[1, 2]), entry(0x8004, &[3])]);
        assert_eq!(result.to_bytes(None).unwrap(), vec![1, 2, 0, 0, 3]);
    }

    #[test]
    fn starting_at_anchors_the_walk() {
        let result = result(vec![entry(0x8002, &[9])]);
        assert_eq!(result.to_bytes(Some(0x8000)).unwrap(), vec![0, 0, 9]);
    }

    #[test]
    fn masks_the_unmasked_counter() {
        let result = result(vec![entry(0xFFFF_FFFF_FFFF_8000, &[7])]);
        assert_eq!(result.to_bytes(Some(0x7FFE)).unwrap(), vec![0, 0, 7]);
    }

    #[test]
    fn backward_placement_is_fatal() {
        let result = result(vec![entry(0x8004, &[1]), entry(0x8000, &[2])]);
        assert!(matches!(
            result.to_bytes(None),
            Err(Error::Placement { found: 0x8000, expected: 0x8005 })
        ));
    }

    #[test]
    fn empty_entries_are_kept_without_advancing() {
        let result = result(vec![entry(0x8000, &[]), entry(0x8000, &[5])]);
        let entries = result.output_with_aligns(None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(result.to_bytes(None).unwrap(), vec![5]);
    }
}
