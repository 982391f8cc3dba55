//! Reading alignments and writing consensus sequences.
//!
//! - **SAM/BAM**: [`alignment::AlignmentReader`] streams records and the `@SQ`
//!   contig list from a file header
//! - **FASTA**: [`fasta::write_consensuses`] writes one `<contig>_cns` record per contig
//!
//! ## Example
//!
//! ```rust,no_run
//! use clip_consensus::parsing::alignment::AlignmentReader;
//! use std::path::Path;
//!
//! let reader = AlignmentReader::open(Path::new("sample.bam")).unwrap();
//! for contig in reader.contigs() {
//!     println!("{}\t{}", contig.name, contig.length);
//! }
//! ```

pub mod alignment;
pub mod fasta;
