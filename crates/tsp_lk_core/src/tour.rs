//! TSPLIB tour-file parser/writer.
//!
//! Tours are stored with 1-based node ids, terminated by `-1` and `EOF`.
//! Reading a tour file, writing it, and re-reading it yields an identical
//! node sequence.

use std::{
    fmt::{Display, Formatter},
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, Result, spec_writer::SpecWriter};

const TOUR_SECTION_HEADER: &str = "TOUR_SECTION";
const TOUR_END_MARKER: &str = "-1";
const EOF_MARKER: &str = "EOF";
const NODE_ID_OFFSET: usize = 1;

/// TSPLIB `.tour` file model.
#[derive(Clone, Debug, PartialEq)]
pub struct TourFile {
    pub name: Option<String>,
    pub comment_lines: Vec<String>,
    pub dimension: Option<usize>,
    /// Node identifiers exactly as stored in TSPLIB (1-based).
    pub tour_section: Vec<usize>,
    pub emit_eof: bool,
}

impl TourFile {
    pub fn new() -> Self {
        Self {
            name: None,
            comment_lines: Vec::new(),
            dimension: None,
            tour_section: Vec::new(),
            emit_eof: true,
        }
    }

    /// Builds a writable tour file from a zero-based node sequence.
    pub fn from_tour(name: &str, tour: &[usize], cost: i64) -> Self {
        Self {
            name: Some(format!("{name}.{cost}.tour")),
            comment_lines: vec![format!("Length = {cost}")],
            dimension: Some(tour.len()),
            tour_section: tour.iter().map(|&id| id + NODE_ID_OFFSET).collect(),
            emit_eof: true,
        }
    }

    /// Reads and parses a tour file from disk.
    pub fn from_file(file_path: impl Into<PathBuf>) -> Result<Self> {
        let text = fs::read_to_string(file_path.into())?;
        Self::parse(&text)
    }

    /// Returns the tour converted from TSPLIB's 1-based ids to 0-based ids.
    pub fn zero_based_tour(&self) -> Result<Vec<usize>> {
        let mut zero_based = Vec::with_capacity(self.tour_section.len());
        for &id in &self.tour_section {
            if id < NODE_ID_OFFSET {
                return Err(Error::invalid_data(format!(
                    "bad node id {id}; TSPLIB ids must be >= {NODE_ID_OFFSET}"
                )));
            }
            zero_based.push(id - NODE_ID_OFFSET);
        }
        Ok(zero_based)
    }

    /// Serializes and writes this tour to disk.
    pub fn write_to_file(&self, file_path: impl AsRef<Path>) -> Result<()> {
        fs::write(file_path.as_ref(), self.to_string()).map_err(Error::Io)
    }

    fn parse(text: &str) -> Result<Self> {
        let mut tour = Self::new();
        tour.emit_eof = false;
        let mut in_tour_section = false;
        let mut tour_terminated = false;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line.eq_ignore_ascii_case(EOF_MARKER) {
                tour.emit_eof = true;
                break;
            }

            if !in_tour_section {
                if line.eq_ignore_ascii_case(TOUR_SECTION_HEADER) {
                    in_tour_section = true;
                    continue;
                }

                if let Some((key, value)) = line
                    .split_once(':')
                    .or_else(|| line.split_once('='))
                    .map(|(key, value)| (key.trim().to_ascii_uppercase(), value.trim()))
                {
                    match key.as_str() {
                        "NAME" => tour.name = Some(value.to_string()),
                        "COMMENT" => tour.comment_lines.push(value.to_string()),
                        "TYPE" => {
                            if !value.eq_ignore_ascii_case("TOUR") {
                                return Err(Error::invalid_data(format!(
                                    "unsupported tour TYPE '{value}'"
                                )));
                            }
                        }
                        "DIMENSION" => {
                            let parsed = value.parse::<usize>().map_err(|e| {
                                Error::invalid_data(format!("bad DIMENSION value '{value}': {e}"))
                            })?;
                            tour.dimension = Some(parsed);
                        }
                        _ => {}
                    }
                }

                continue;
            }

            for token in line.split_whitespace() {
                if token == TOUR_END_MARKER {
                    tour_terminated = true;
                    break;
                }
                if token.eq_ignore_ascii_case(EOF_MARKER) {
                    tour.emit_eof = true;
                    tour_terminated = true;
                    break;
                }

                let id: usize = token.parse().map_err(|e| {
                    Error::invalid_data(format!("bad tour token '{token}': {e}"))
                })?;
                tour.tour_section.push(id);
            }

            if tour_terminated {
                break;
            }
        }

        if !in_tour_section {
            return Err(Error::invalid_data("missing TOUR_SECTION"));
        }

        if let Some(dimension) = tour.dimension
            && dimension != tour.tour_section.len()
        {
            return Err(Error::invalid_data(format!(
                "DIMENSION is {dimension}, but TOUR_SECTION has {} nodes",
                tour.tour_section.len()
            )));
        }

        Ok(tour)
    }
}

impl Default for TourFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TourFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut writer = SpecWriter::new(f);

        writer.opt_kv_colon("NAME", self.name.as_deref())?;
        writer.kv_colon("TYPE", "TOUR")?;

        for comment in &self.comment_lines {
            writer.kv_colon("COMMENT", comment)?;
        }

        writer.opt_kv_colon("DIMENSION", self.dimension)?;

        if !self.tour_section.is_empty() {
            writer.lines(TOUR_SECTION_HEADER, &self.tour_section)?;
            writer.line(TOUR_END_MARKER)?;
        }

        if self.emit_eof {
            writer.line(EOF_MARKER)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::TourFile;

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tsp-lk-tests-{name}-{nanos}"))
    }

    #[test]
    fn parse_reads_tour_section_and_converts_to_zero_based() {
        let tour = TourFile::parse("TYPE : TOUR\nDIMENSION : 3\nTOUR_SECTION\n2\n1\n3\n-1\nEOF\n")
            .expect("parse tour");
        assert_eq!(tour.dimension, Some(3));
        assert_eq!(tour.tour_section, vec![2, 1, 3]);
        assert_eq!(tour.zero_based_tour().expect("zero based"), vec![1, 0, 2]);
    }

    #[test]
    fn parse_rejects_dimension_mismatch() {
        let err = TourFile::parse("DIMENSION : 4\nTOUR_SECTION\n1\n2\n-1\nEOF\n")
            .expect_err("dimension mismatch should fail");
        assert!(err.to_string().contains("DIMENSION is 4"));
    }

    #[test]
    fn parse_requires_tour_section() {
        let err = TourFile::parse("NAME : x\nEOF\n").expect_err("missing section should fail");
        assert!(err.to_string().contains("TOUR_SECTION"));
    }

    #[test]
    fn write_then_read_round_trips_node_sequence() {
        let dir = unique_temp_dir("round-trip");
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("run.tour");

        let written = TourFile::from_tour("sample", &[2, 0, 1, 3], 42);
        written.write_to_file(&path).expect("write tour file");

        let read = TourFile::from_file(&path).expect("read tour file");
        assert_eq!(read.tour_section, written.tour_section);
        assert_eq!(read.dimension, Some(4));
        assert_eq!(read.zero_based_tour().expect("zero based"), vec![2, 0, 1, 3]);

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }

    #[test]
    fn display_writes_tsplib_tour_format() {
        let tour = TourFile::from_tour("sample", &[0, 1, 2], 42);
        let text = tour.to_string();

        assert!(text.contains("NAME: sample.42.tour"));
        assert!(text.contains("TYPE: TOUR"));
        assert!(text.contains("COMMENT: Length = 42"));
        assert!(text.contains("DIMENSION: 3"));
        assert!(text.contains("TOUR_SECTION\n1\n2\n3\n-1\n"));
        assert!(text.ends_with("EOF\n"));
    }
}
