//! FASTA output of consensus sequences using noodles.

use std::io::{self, Write};

use noodles::fasta;
use noodles::fasta::record::{Definition, Sequence};

use crate::consensus::pipeline::ContigConsensus;

/// Write one FASTA record per consensus, named `<contig>_cns`
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_consensuses<W: Write>(writer: W, consensuses: &[ContigConsensus]) -> io::Result<()> {
    let mut writer = fasta::io::Writer::new(writer);

    for consensus in consensuses {
        let definition = Definition::new(consensus.record_name(), None);
        let sequence = Sequence::from(consensus.sequence.clone().into_bytes());
        writer.write_record(&fasta::Record::new(definition, sequence))?;
    }

    Ok(())
}
