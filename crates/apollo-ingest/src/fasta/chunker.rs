//! Chunk accumulator state machine
//!
//! Consumes tokens in order and emits store operations: a reference
//! sequence when a header opens a record, fixed-size chunks as soon as
//! enough residues are buffered, and the final length when the record is
//! closed by the next header or the end of the stream. Only the last chunk
//! of a record may be shorter than the chunk size.
//!
//! Chunk sizes and record lengths count characters, so multibyte residues
//! are never split.

use apollo_common::types::{ReferenceSequence, SequenceChunk};
use uuid::Uuid;

use super::tokenizer::Token;
use super::{FastaError, FastaEvent};

/// Fields shared by every entity produced for one assembly
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub assembly_id: Uuid,
    pub chunk_size: usize,
    pub user: String,
}

/// A write the accumulator asks the store to perform, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOp {
    StartRecord(ReferenceSequence),
    Chunk(SequenceChunk),
    FinishRecord { refseq_id: Uuid, length: i64 },
}

struct ActiveRecord {
    refseq_id: Uuid,
    buffer: String,
    /// Characters held in `buffer`
    buffered: usize,
    chunk_index: i64,
    total_length: i64,
}

enum State {
    NoActiveRecord,
    Active(ActiveRecord),
    Finished,
}

pub struct ChunkAccumulator {
    context: RecordContext,
    state: State,
}

impl ChunkAccumulator {
    pub fn new(mut context: RecordContext) -> Self {
        context.chunk_size = context.chunk_size.max(1);
        Self {
            context,
            state: State::NoActiveRecord,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Advance the state machine by one token, appending operations to `out`.
    pub fn feed(&mut self, token: Token, out: &mut Vec<ChunkOp>) -> Result<(), FastaError> {
        match token.event {
            FastaEvent::Header { name, description } => {
                self.close_record(out);
                if !self.is_finished() {
                    self.open_record(name, description, out);
                }
            },
            FastaEvent::Data(text) => match &mut self.state {
                State::Active(record) => {
                    push_residues(&self.context, record, &text, out);
                },
                State::NoActiveRecord => {
                    return Err(FastaError::SequenceBeforeHeader { line: token.line });
                },
                State::Finished => {},
            },
            FastaEvent::End => {
                self.close_record(out);
                self.state = State::Finished;
            },
        }
        Ok(())
    }

    fn open_record(&mut self, name: String, description: String, out: &mut Vec<ChunkOp>) {
        let refseq = ReferenceSequence::new(
            self.context.assembly_id,
            name,
            description,
            self.context.chunk_size as i64,
            self.context.user.clone(),
        );
        self.state = State::Active(ActiveRecord {
            refseq_id: refseq.id,
            buffer: String::with_capacity(self.context.chunk_size),
            buffered: 0,
            chunk_index: 0,
            total_length: 0,
        });
        out.push(ChunkOp::StartRecord(refseq));
    }

    /// Flush the residue buffer as a final chunk and publish the length.
    fn close_record(&mut self, out: &mut Vec<ChunkOp>) {
        let mut record = match std::mem::replace(&mut self.state, State::NoActiveRecord) {
            State::Active(record) => record,
            other => {
                self.state = other;
                return;
            },
        };

        if record.buffered > 0 {
            emit_chunk(&self.context, &mut record, out);
        }

        out.push(ChunkOp::FinishRecord {
            refseq_id: record.refseq_id,
            length: record.total_length,
        });
    }
}

fn push_residues(context: &RecordContext, record: &mut ActiveRecord, residues: &str, out: &mut Vec<ChunkOp>) {
    let mut start = 0;
    for (offset, c) in residues.char_indices() {
        record.buffered += 1;
        if record.buffered == context.chunk_size {
            let end = offset + c.len_utf8();
            record.buffer.push_str(&residues[start..end]);
            start = end;
            emit_chunk(context, record, out);
        }
    }
    record.buffer.push_str(&residues[start..]);
}

/// Publish the buffered residues as the record's next chunk.
fn emit_chunk(context: &RecordContext, record: &mut ActiveRecord, out: &mut Vec<ChunkOp>) {
    let sequence = std::mem::replace(&mut record.buffer, String::with_capacity(context.chunk_size));
    out.push(ChunkOp::Chunk(SequenceChunk::new(
        record.refseq_id,
        record.chunk_index,
        sequence,
        context.user.clone(),
    )));
    record.chunk_index += 1;
    record.total_length += record.buffered as i64;
    record.buffered = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn context(chunk_size: usize) -> RecordContext {
        RecordContext {
            assembly_id: Uuid::new_v4(),
            chunk_size,
            user: "apollo-loader-1".to_string(),
        }
    }

    fn token(event: FastaEvent) -> Token {
        Token { line: 1, event }
    }

    fn header(name: &str) -> FastaEvent {
        FastaEvent::Header {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn run(chunk_size: usize, events: Vec<FastaEvent>) -> Result<Vec<ChunkOp>, FastaError> {
        let mut accumulator = ChunkAccumulator::new(context(chunk_size));
        let mut ops = Vec::new();
        for event in events {
            accumulator.feed(token(event), &mut ops)?;
        }
        Ok(ops)
    }

    /// Reference sequence name -> (chunks in emission order, published length)
    fn collect(ops: &[ChunkOp]) -> Vec<(String, Vec<SequenceChunk>, Option<i64>)> {
        let mut order = Vec::new();
        let mut by_id: HashMap<Uuid, usize> = HashMap::new();
        for op in ops {
            match op {
                ChunkOp::StartRecord(refseq) => {
                    by_id.insert(refseq.id, order.len());
                    order.push((refseq.name.clone(), Vec::new(), None));
                },
                ChunkOp::Chunk(chunk) => order[by_id[&chunk.refseq_id]].1.push(chunk.clone()),
                ChunkOp::FinishRecord { refseq_id, length } => {
                    order[by_id[refseq_id]].2 = Some(*length)
                },
            }
        }
        order
    }

    #[test]
    fn test_toy_example() {
        let ops = run(
            4,
            vec![
                FastaEvent::Header {
                    name: "seq1".into(),
                    description: "desc".into(),
                },
                FastaEvent::Data("ACGTACGT".into()),
                FastaEvent::Data("ACGT".into()),
                header("seq2"),
                FastaEvent::Data("TT".into()),
                FastaEvent::End,
            ],
        )
        .unwrap();

        let records = collect(&ops);
        assert_eq!(records.len(), 2);

        let (name, chunks, length) = &records[0];
        assert_eq!(name, "seq1");
        assert_eq!(*length, Some(12));
        let seqs: Vec<&str> = chunks.iter().map(|c| c.sequence.as_str()).collect();
        assert_eq!(seqs, vec!["ACGT", "ACGT", "ACGT"]);
        let indices: Vec<i64> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let (name, chunks, length) = &records[1];
        assert_eq!(name, "seq2");
        assert_eq!(*length, Some(2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, "TT");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_start_record_carries_context() {
        let ctx = context(8);
        let assembly_id = ctx.assembly_id;
        let mut accumulator = ChunkAccumulator::new(ctx);
        let mut ops = Vec::new();
        accumulator
            .feed(
                token(FastaEvent::Header {
                    name: "chrX".into(),
                    description: "X chromosome".into(),
                }),
                &mut ops,
            )
            .unwrap();

        let ChunkOp::StartRecord(refseq) = &ops[0] else {
            panic!("expected StartRecord, got {:?}", ops[0]);
        };
        assert_eq!(refseq.assembly_id, assembly_id);
        assert_eq!(refseq.description, "X chromosome");
        assert_eq!(refseq.length, 0);
        assert_eq!(refseq.chunk_size, 8);
        assert_eq!(refseq.user, "apollo-loader-1");
    }

    #[test]
    fn test_chunks_span_line_boundaries() {
        let ops = run(
            5,
            vec![
                header("s"),
                FastaEvent::Data("AC".into()),
                FastaEvent::Data("GTA".into()),
                FastaEvent::Data("CGTACGTAC".into()),
                FastaEvent::End,
            ],
        )
        .unwrap();
        let records = collect(&ops);
        let seqs: Vec<&str> = records[0].1.iter().map(|c| c.sequence.as_str()).collect();
        assert_eq!(seqs, vec!["ACGTA", "CGTAC", "GTAC"]);
        assert_eq!(records[0].2, Some(14));
    }

    #[test]
    fn test_chunk_emitted_before_end_when_buffer_fills() {
        let mut accumulator = ChunkAccumulator::new(context(3));
        let mut ops = Vec::new();
        accumulator.feed(token(header("s")), &mut ops).unwrap();
        accumulator
            .feed(token(FastaEvent::Data("ACGTA".into())), &mut ops)
            .unwrap();
        // StartRecord + one full chunk; "TA" is still buffered
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[1], ChunkOp::Chunk(c) if c.sequence == "ACG"));
    }

    #[test]
    fn test_multibyte_residues_count_as_characters() {
        let ops = run(
            4,
            vec![
                header("seq1"),
                FastaEvent::Data("ACGTé".into()),
                FastaEvent::Data("漢字AB".into()),
                FastaEvent::End,
            ],
        )
        .unwrap();
        let records = collect(&ops);
        let seqs: Vec<&str> = records[0].1.iter().map(|c| c.sequence.as_str()).collect();
        assert_eq!(seqs, vec!["ACGT", "é漢字A", "B"]);
        assert_eq!(records[0].2, Some(9));
    }

    #[test]
    fn test_empty_record_has_no_chunks() {
        let ops = run(
            4,
            vec![
                header("empty"),
                header("full"),
                FastaEvent::Data("A".into()),
                FastaEvent::End,
            ],
        )
        .unwrap();
        let records = collect(&ops);
        assert_eq!(records[0].0, "empty");
        assert!(records[0].1.is_empty());
        assert_eq!(records[0].2, Some(0));
        assert_eq!(records[1].2, Some(1));
    }

    #[test]
    fn test_empty_stream_produces_nothing() {
        let ops = run(4, vec![FastaEvent::End]).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_data_before_header_is_error() {
        let mut accumulator = ChunkAccumulator::new(context(4));
        let mut ops = Vec::new();
        let err = accumulator
            .feed(
                Token {
                    line: 3,
                    event: FastaEvent::Data("ACGT".into()),
                },
                &mut ops,
            )
            .unwrap_err();
        assert!(matches!(err, FastaError::SequenceBeforeHeader { line: 3 }));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_finished_after_end() {
        let mut accumulator = ChunkAccumulator::new(context(4));
        let mut ops = Vec::new();
        accumulator.feed(token(header("a")), &mut ops).unwrap();
        accumulator.feed(token(FastaEvent::End), &mut ops).unwrap();
        assert!(accumulator.is_finished());

        let before = ops.len();
        accumulator.feed(token(header("b")), &mut ops).unwrap();
        assert_eq!(ops.len(), before);
    }

    proptest! {
        #[test]
        fn prop_chunks_reassemble_records(
            records in proptest::collection::vec(
                proptest::collection::vec("[ACGTNéµ漢]{1,40}", 0..8),
                1..5,
            ),
            chunk_size in 1usize..24,
        ) {
            let mut events = Vec::new();
            for (i, lines) in records.iter().enumerate() {
                events.push(header(&format!("r{}", i)));
                events.extend(lines.iter().cloned().map(FastaEvent::Data));
            }
            events.push(FastaEvent::End);

            let ops = run(chunk_size, events).unwrap();
            let collected = collect(&ops);
            prop_assert_eq!(collected.len(), records.len());

            for ((_, chunks, length), lines) in collected.iter().zip(&records) {
                let expected = lines.concat();

                // round trip
                let joined: String = chunks.iter().map(|c| c.sequence.as_str()).collect();
                prop_assert_eq!(&joined, &expected);

                // index contiguity
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.index, i as i64);
                }

                // chunk sizing
                if let Some((last, body)) = chunks.split_last() {
                    for chunk in body {
                        prop_assert_eq!(chunk.sequence.chars().count(), chunk_size);
                    }
                    prop_assert!(!last.sequence.is_empty() && last.sequence.chars().count() <= chunk_size);
                } else {
                    prop_assert!(expected.is_empty());
                }

                // length invariant
                let total: usize = chunks.iter().map(|c| c.sequence.chars().count()).sum();
                prop_assert_eq!(*length, Some(total as i64));
            }
        }
    }
}
