//! Streaming reader for the letter dataset format.
//!
//! Each line of the file is one record: `label,pixel0,pixel1,...` with the
//! label in `[1, num_classes]` and pixel intensities in 0–255. There is no
//! header line.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::prelude::*;

/// Pixel intensities are divided by 256, not 255, so a fully-lit pixel lands
/// strictly below 1.0. Legacy scaling, preserved for compatibility with
/// existing saved configurations.
const COLOR_MAX_VALUE: f64 = 256.0;

/// One supervised sample: normalized pixel inputs plus a one-hot target.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

/// Sequential reader over a dataset file.
///
/// Opening scans the whole file once to count records and rewinds — a known
/// O(n) double pass. The count goes stale if the file changes afterwards.
pub struct DatasetReader {
    reader: BufReader<File>,
    num_classes: usize,
    count: u64,
    cursor: u64,
}

impl DatasetReader {
    pub fn open(path: impl AsRef<Path>, num_classes: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut res = Self {
            reader: BufReader::new(file),
            num_classes,
            count: 0,
            cursor: 0,
        };
        res.count = res.scan_count()?;
        res.rewind()?;

        debug!(
            "opened dataset {:?} with {} records",
            path.as_ref(),
            res.count
        );
        Ok(res)
    }

    /// Number of records found by the opening pre-scan.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Reads the next record, or `Ok(None)` at end of data.
    ///
    /// A line with no separator or a non-numeric field is a parse failure,
    /// never an end-of-file condition.
    pub fn read_next(&mut self) -> Result<Option<Sample>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line_no = self.cursor;
        self.cursor += 1;

        let record = line.trim_end_matches(['\r', '\n']);
        let malformed = || Error::MalformedRecord { line: line_no };

        let (label, pixels) = record.split_once(',').ok_or_else(malformed)?;
        let label: usize = label.trim().parse().map_err(|_| malformed())?;
        if label < 1 || label > self.num_classes {
            return Err(malformed());
        }

        let mut target = vec![0.0; self.num_classes];
        target[label - 1] = 1.0;

        let mut input = Vec::new();
        for field in pixels.split(',') {
            let value: f64 = field.trim().parse().map_err(|_| malformed())?;
            input.push(value / COLOR_MAX_VALUE);
        }

        Ok(Some(Sample { input, target }))
    }

    /// Seeks back to the first record.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.cursor = 0;
        Ok(())
    }

    /// Re-reads from the start, discarding `n` lines.
    pub fn seek_to(&mut self, n: u64) -> Result<()> {
        self.rewind()?;
        let mut line = String::new();
        for _ in 0..n {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            self.cursor += 1;
        }
        Ok(())
    }

    /// Counts line reads until the stream is exhausted, minus one: the final
    /// empty read is counted like any other line, so a well-formed file of N
    /// records counts N.
    fn scan_count(&mut self) -> Result<u64> {
        let mut lines: u64 = 0;
        let mut buf = String::new();
        loop {
            buf.clear();
            let read = self.reader.read_line(&mut buf)?;
            lines += 1;
            if read == 0 {
                break;
            }
        }
        Ok(lines - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dataset(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("letter_nn_{}_{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn counts_records() {
        let path = write_dataset("count.csv", "1,0,128\n2,255,0\n1,64,64\n");
        let reader = DatasetReader::open(&path, 2).unwrap();

        assert_eq!(reader.count(), 3);
    }

    #[test]
    fn empty_file_counts_zero() {
        let path = write_dataset("empty.csv", "");
        let reader = DatasetReader::open(&path, 2).unwrap();

        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn reads_one_hot_and_scaled_pixels() {
        let path = write_dataset("scale.csv", "2,0,128,255\n");
        let mut reader = DatasetReader::open(&path, 3).unwrap();

        let sample = reader.read_next().unwrap().unwrap();
        assert_eq!(sample.target, vec![0.0, 1.0, 0.0]);
        // 256 divisor, not 255: a fully-lit pixel stays below 1.0
        assert_eq!(sample.input, vec![0.0, 0.5, 255.0 / 256.0]);

        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let path = write_dataset("nosep.csv", "1,0,0\njunk\n");
        let mut reader = DatasetReader::open(&path, 2).unwrap();

        reader.read_next().unwrap();
        assert!(matches!(
            reader.read_next(),
            Err(Error::MalformedRecord { line: 1 })
        ));
    }

    #[test]
    fn non_numeric_field_is_malformed() {
        let path = write_dataset("nonnum.csv", "1,0,abc\n");
        let mut reader = DatasetReader::open(&path, 2).unwrap();

        assert!(matches!(
            reader.read_next(),
            Err(Error::MalformedRecord { line: 0 })
        ));
    }

    #[test]
    fn out_of_range_label_is_malformed() {
        let path = write_dataset("label.csv", "3,0,0\n");
        let mut reader = DatasetReader::open(&path, 2).unwrap();

        assert!(matches!(
            reader.read_next(),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn rewind_restarts_from_first_record() {
        let path = write_dataset("rewind.csv", "1,10\n2,20\n");
        let mut reader = DatasetReader::open(&path, 2).unwrap();

        let first = reader.read_next().unwrap().unwrap();
        reader.read_next().unwrap().unwrap();
        assert!(reader.read_next().unwrap().is_none());

        reader.rewind().unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap(), first);
    }

    #[test]
    fn seek_discards_lines() {
        let path = write_dataset("seek.csv", "1,10\n2,20\n1,30\n");
        let mut reader = DatasetReader::open(&path, 2).unwrap();

        reader.seek_to(2).unwrap();
        let sample = reader.read_next().unwrap().unwrap();
        assert_eq!(sample.input, vec![30.0 / 256.0]);
    }
}
