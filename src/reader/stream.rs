//! Built-in [`FitsReader`] over any seekable byte source.
//!
//! The whole stream is indexed once at open time: headers are walked block
//! by block looking for END, the handful of keywords that fix the data-unit
//! size are picked up on the way, and every complete HDU gets a byte-range
//! entry. Validation then addresses HDUs by index without re-scanning.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;

use super::{ChecksumReport, FitsReader, HduByteRange, StreamPosition};
use crate::card::{self, CARD_LEN};
use crate::error::Error;
use crate::state::HduKind;

pub(crate) const BLOCK_LEN: usize = 2880;
const CARDS_PER_BLOCK: usize = BLOCK_LEN / CARD_LEN;

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

#[derive(Debug, Clone)]
struct HduInfo {
    kind: HduKind,
    header_start: u64,
    data_start: u64,
    /// End of the data unit including fill, i.e. start of the next HDU.
    data_end: u64,
    num_cards: usize,
}

/// Why the scan stopped before a clean end of stream.
#[derive(Debug, Clone, Copy)]
enum TailFailure {
    /// Header ran to end of stream without an END card.
    EndNotFound(usize),
    /// Declared data unit extends past the end of the stream.
    Truncated(usize),
}

impl TailFailure {
    fn to_error(self) -> Error {
        match self {
            TailFailure::EndNotFound(hdu) => Error::EndNotFound(hdu),
            TailFailure::Truncated(hdu) => Error::TruncatedHdu(hdu),
        }
    }
}

pub struct StreamReader {
    src: Box<dyn ReadSeek>,
    source: String,
    stream_len: u64,
    hdus: Vec<HduInfo>,
    tail: Option<TailFailure>,
    /// 0-based index of the current HDU.
    cur: usize,
    /// Cached header bytes of the current HDU.
    header: Vec<u8>,
    status: Option<String>,
    stack: VecDeque<String>,
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("source", &self.source)
            .field("stream_len", &self.stream_len)
            .field("hdus", &self.hdus)
            .field("tail", &self.tail)
            .field("cur", &self.cur)
            .field("status", &self.status)
            .field("stack", &self.stack)
            .finish()
    }
}

impl StreamReader {
    /// Open a FITS file; gzip-compressed files are decompressed in memory,
    /// mirroring the sniffing done for plain readers.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let source = path.as_ref().display().to_string();
        let f = File::open(&path)?;
        let bufreader = BufReader::new(f);
        let mut gz = GzDecoder::new(bufreader);
        if gz.header().is_some() {
            let mut buf = Vec::new();
            gz.read_to_end(&mut buf)?;
            Self::from_src(Box::new(Cursor::new(buf)), source)
        } else {
            let mut f = gz.into_inner();
            f.rewind()?;
            Self::from_src(Box::new(f), source)
        }
    }

    /// Wrap an in-memory buffer.
    pub fn open_memory(buf: Vec<u8>, label: impl Into<String>) -> Result<Self, Error> {
        Self::from_src(Box::new(Cursor::new(buf)), label.into())
    }

    fn from_src(mut src: Box<dyn ReadSeek>, source: String) -> Result<Self, Error> {
        let stream_len = src.seek(SeekFrom::End(0))?;
        src.rewind()?;
        let mut rdr = Self {
            src,
            source,
            stream_len,
            hdus: Vec::new(),
            tail: None,
            cur: 0,
            header: Vec::new(),
            status: None,
            stack: VecDeque::new(),
        };
        rdr.scan()?;
        rdr.load_header(0)?;
        Ok(rdr)
    }

    /// Index every HDU of the stream. A malformed tail is remembered but
    /// does not fail the open as long as one complete HDU exists.
    fn scan(&mut self) -> Result<(), Error> {
        let mut pos: u64 = 0;
        let mut block = [0_u8; BLOCK_LEN];

        while pos < self.stream_len {
            let hdu_index = self.hdus.len() + 1;
            if self.stream_len - pos < BLOCK_LEN as u64 {
                if hdu_index == 1 {
                    return Err(Error::NotFits("stream is shorter than one 2880-byte block"));
                }
                // A trailing fragment; the end-of-stream probe reports it.
                break;
            }
            let header_start = pos;
            let mut scan = HeaderScan::default();
            let mut end_found = false;

            while !end_found {
                if self.read_at(pos, &mut block).is_err() {
                    self.tail = Some(TailFailure::EndNotFound(hdu_index));
                    self.push_stack(format!(
                        "header of HDU {hdu_index} ends at byte {} without an END card",
                        self.stream_len
                    ));
                    return self.finish_scan();
                }
                if pos == header_start {
                    // The first card announces the HDU type.
                    let primary = hdu_index == 1;
                    if let Err(why) = scan.classify(&block, primary) {
                        if primary {
                            return Err(Error::NotFits(why));
                        }
                        self.push_stack(format!(
                            "HDU {hdu_index} does not start with XTENSION"
                        ));
                    }
                }
                for (i, raw) in block.chunks_exact(CARD_LEN).enumerate() {
                    if end_found {
                        break;
                    }
                    scan.take(raw);
                    if raw[..8] == *b"END     " {
                        let blocks_done = (pos - header_start) as usize / BLOCK_LEN;
                        scan.num_cards = blocks_done * CARDS_PER_BLOCK + i + 1;
                        end_found = true;
                    }
                }
                pos += BLOCK_LEN as u64;
            }

            let data_start = pos;
            let data_len = scan.data_len();
            let padded = data_len.div_ceil(BLOCK_LEN as u64) * BLOCK_LEN as u64;
            let data_end = data_start + padded;
            if data_end > self.stream_len {
                self.tail = Some(TailFailure::Truncated(hdu_index));
                self.push_stack(format!(
                    "data of HDU {hdu_index} needs {data_end} bytes but the stream has {}",
                    self.stream_len
                ));
                return self.finish_scan();
            }

            self.hdus.push(HduInfo {
                kind: scan.kind,
                header_start,
                data_start,
                data_end,
                num_cards: scan.num_cards,
            });
            pos = data_end;
        }

        self.finish_scan()
    }

    fn finish_scan(&mut self) -> Result<(), Error> {
        if self.hdus.is_empty() {
            match self.tail {
                Some(t) => Err(t.to_error()),
                None => Err(Error::NotFits("stream is empty")),
            }
        } else {
            Ok(())
        }
    }

    fn load_header(&mut self, index0: usize) -> Result<(), Error> {
        let info = self.hdus[index0].clone();
        let len = (info.data_start - info.header_start) as usize;
        let mut header = vec![0_u8; len];
        self.read_at(info.header_start, &mut header)?;
        self.cur = index0;
        self.header = header;
        Ok(())
    }

    fn info(&self) -> &HduInfo {
        &self.hdus[self.cur]
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.src.seek(SeekFrom::Start(offset))?;
        self.src.read_exact(buf)?;
        Ok(())
    }

    fn push_stack(&mut self, line: String) {
        self.status = Some(line.clone());
        self.stack.push_back(line);
    }

    fn find_card(&self, name: &str) -> Option<card::ParsedCard> {
        for (i, raw) in self.header.chunks_exact(CARD_LEN).enumerate() {
            let trimmed = raw[..8]
                .iter()
                .take_while(|&&b| b != b' ')
                .map(|&b| b as char)
                .collect::<String>();
            if trimmed == name {
                return Some(card::parse(raw, i + 1, false));
            }
        }
        None
    }

    fn keyword_card(&mut self, name: &str) -> Result<card::ParsedCard, Error> {
        match self.find_card(name) {
            Some(card) => Ok(card),
            None => {
                self.push_stack(format!("keyword {name} not found in HDU {}", self.cur + 1));
                Err(Error::KeywordNotFound(name.to_owned()))
            }
        }
    }

    fn wrong_type(&mut self, name: &str) -> Error {
        self.push_stack(format!(
            "keyword {name} in HDU {} has an unexpected value type",
            self.cur + 1
        ));
        Error::KeywordWrongType(name.to_owned())
    }
}

impl FitsReader for StreamReader {
    fn source(&self) -> &str {
        &self.source
    }

    fn hdu_count(&mut self) -> Result<usize, Error> {
        Ok(self.hdus.len())
    }

    fn move_to_hdu(&mut self, index: usize) -> Result<HduKind, Error> {
        if index == 0 || index > self.hdus.len() {
            if index == self.hdus.len() + 1 {
                // One past the end: report how the stream actually stops.
                if let Some(t) = self.tail {
                    return Err(t.to_error());
                }
            }
            return Err(Error::BadHduIndex(index, self.hdus.len()));
        }
        self.load_header(index - 1)?;
        Ok(self.info().kind)
    }

    fn move_relative(&mut self, delta: i64) -> Result<HduKind, Error> {
        let target = self.cur as i64 + 1 + delta;
        if target < 1 {
            return Err(Error::BadHduIndex(0, self.hdus.len()));
        }
        self.move_to_hdu(target as usize)
    }

    fn num_cards(&mut self) -> Result<usize, Error> {
        Ok(self.info().num_cards)
    }

    fn read_card(&mut self, index: usize) -> Result<[u8; 80], Error> {
        let num_cards = self.info().num_cards;
        if index == 0 || index > num_cards {
            self.push_stack(format!("card {index} is out of range"));
            return Err(Error::PastEnd);
        }
        let off = (index - 1) * CARD_LEN;
        let mut raw = [0_u8; CARD_LEN];
        raw.copy_from_slice(&self.header[off..off + CARD_LEN]);
        Ok(raw)
    }

    fn read_keyword_i64(&mut self, name: &str) -> Result<i64, Error> {
        let card = self.keyword_card(name)?;
        card.int_value().ok_or_else(|| self.wrong_type(name))
    }

    fn read_keyword_f64(&mut self, name: &str) -> Result<f64, Error> {
        let card = self.keyword_card(name)?;
        card.float_value().ok_or_else(|| self.wrong_type(name))
    }

    fn read_keyword_str(&mut self, name: &str) -> Result<String, Error> {
        let card = self.keyword_card(name)?;
        if card.kind == card::Kind::Str {
            Ok(card.value)
        } else {
            Err(self.wrong_type(name))
        }
    }

    fn hdu_byte_range(&mut self) -> Result<HduByteRange, Error> {
        let info = self.info();
        Ok(HduByteRange {
            header_start: info.header_start,
            data_start: info.data_start,
            data_end: info.data_end,
        })
    }

    fn position_at_byte(&mut self, offset: u64) -> Result<StreamPosition, Error> {
        if offset > self.stream_len {
            return Ok(StreamPosition::PastEnd);
        }
        self.src.seek(SeekFrom::Start(offset))?;
        if offset == self.stream_len {
            Ok(StreamPosition::AtEnd)
        } else {
            Ok(StreamPosition::Within)
        }
    }

    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        if offset + buf.len() as u64 > self.stream_len {
            self.push_stack(format!(
                "read of {} bytes at offset {offset} runs past the stream end",
                buf.len()
            ));
            return Err(Error::PastEnd);
        }
        self.read_at(offset, buf)
    }

    fn verify_checksum(&mut self) -> Result<ChecksumReport, Error> {
        let datasum_card = self.find_card("DATASUM");
        let checksum_card = self.find_card("CHECKSUM");
        if datasum_card.is_none() && checksum_card.is_none() {
            return Ok(ChecksumReport::default());
        }
        let info = self.info().clone();

        let mut data = vec![0_u8; (info.data_end - info.data_start) as usize];
        self.read_bytes(info.data_start, &mut data)?;
        let data_sum = ones_complement_sum(&data, 0);

        let data_ok = datasum_card.and_then(|c| {
            let declared: u64 = c.value.trim().parse().ok()?;
            Some(declared as u32 == data_sum)
        });

        let hdu_ok = checksum_card.map(|_| {
            // CHECKSUM is chosen to make the whole HDU sum to all ones.
            let total = ones_complement_sum(&self.header, data_sum);
            total == u32::MAX
        });

        Ok(ChecksumReport { data_ok, hdu_ok })
    }

    fn status_message(&self) -> Option<String> {
        self.status.clone()
    }

    fn next_stack_message(&mut self) -> Option<String> {
        self.stack.pop_front()
    }

    fn clear_error(&mut self) {
        self.status = None;
        self.stack.clear();
    }
}

/// Keywords picked up while scanning a header, enough to size the data
/// unit that follows it.
#[derive(Debug, Default)]
struct HeaderScan {
    kind: HduKind,
    bitpix: i64,
    naxis: i64,
    naxes: Vec<i64>,
    pcount: i64,
    gcount: i64,
    groups: bool,
    num_cards: usize,
}

impl HeaderScan {
    fn classify(&mut self, block: &[u8], primary: bool) -> Result<(), &'static str> {
        self.gcount = 1;
        if primary {
            if &block[..8] != b"SIMPLE  " {
                return Err("first card is not SIMPLE");
            }
            self.kind = HduKind::Primary;
            return Ok(());
        }
        if &block[..8] != b"XTENSION" {
            return Err("extension does not start with XTENSION");
        }
        let card = card::parse(&block[..CARD_LEN], 1, false);
        self.kind = match card.value.trim() {
            "IMAGE" => HduKind::Image,
            "TABLE" => HduKind::AsciiTable,
            "BINTABLE" => HduKind::BinTable,
            _ => HduKind::Unknown,
        };
        Ok(())
    }

    fn take(&mut self, raw: &[u8]) {
        if raw[8..10] != *b"= " {
            return;
        }
        let name: String = raw[..8]
            .iter()
            .take_while(|&&b| b != b' ')
            .map(|&b| b as char)
            .collect();
        let card = card::parse(raw, 1, false);
        match name.as_str() {
            "BITPIX" => self.bitpix = card.int_value().unwrap_or(0),
            "NAXIS" => self.naxis = card.int_value().unwrap_or(0),
            "PCOUNT" => self.pcount = card.int_value().unwrap_or(0),
            "GCOUNT" => self.gcount = card.int_value().unwrap_or(1),
            "GROUPS" => self.groups = card.logical_value().unwrap_or(false),
            _ => {
                if let Some(n) = name.strip_prefix("NAXIS") {
                    if let Ok(n) = n.parse::<usize>() {
                        if n >= 1 {
                            if self.naxes.len() < n {
                                self.naxes.resize(n, 0);
                            }
                            self.naxes[n - 1] = card.int_value().unwrap_or(0);
                        }
                    }
                }
            }
        }
    }

    fn data_len(&self) -> u64 {
        if self.naxis <= 0 {
            return 0;
        }
        let axes = &self.naxes[..(self.naxis as usize).min(self.naxes.len())];
        // Random groups carry NAXIS1 = 0; the first axis is skipped.
        let product: i64 = if self.groups && axes.first() == Some(&0) {
            axes.iter().skip(1).product()
        } else {
            axes.iter().product()
        };
        if product < 0 {
            return 0;
        }
        let bits = self.bitpix.unsigned_abs() * ((self.pcount.max(0) + product) as u64)
            * self.gcount.max(1) as u64;
        bits / 8
    }
}

/// 32-bit 1's complement sum with end-around carry, the checksum the FITS
/// convention records in DATASUM and zeroes with CHECKSUM.
pub(crate) fn ones_complement_sum(bytes: &[u8], init: u32) -> u32 {
    let mut sum = init as u64;
    for word in bytes.chunks(4) {
        let mut w = [0_u8; 4];
        w[..word.len()].copy_from_slice(word);
        sum += u32::from_be_bytes(w) as u64;
        if sum > 0xFFFF_FFFF {
            sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
        }
    }
    while sum > 0xFFFF_FFFF {
        sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
    }
    sum as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_card(text: &str) -> Vec<u8> {
        let mut raw = text.as_bytes().to_vec();
        raw.resize(CARD_LEN, b' ');
        raw
    }

    fn minimal_image() -> Vec<u8> {
        let mut bytes = Vec::new();
        for text in [
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                   10",
            "NAXIS2  =                   10",
            "END",
        ] {
            bytes.extend_from_slice(&padded_card(text));
        }
        bytes.resize(BLOCK_LEN, b' ');
        // 100 16-bit pixels, zero-filled to one block.
        bytes.resize(BLOCK_LEN + 200, 0);
        bytes.resize(2 * BLOCK_LEN, 0);
        bytes
    }

    #[test]
    fn test_scan_minimal_image() {
        let mut rdr = StreamReader::open_memory(minimal_image(), "mem").unwrap();
        assert_eq!(rdr.hdu_count().unwrap(), 1);
        assert_eq!(rdr.move_to_hdu(1).unwrap(), HduKind::Primary);
        assert_eq!(rdr.num_cards().unwrap(), 6);
        let range = rdr.hdu_byte_range().unwrap();
        assert_eq!(range.header_start, 0);
        assert_eq!(range.data_start, BLOCK_LEN as u64);
        assert_eq!(range.data_end, 2 * BLOCK_LEN as u64);
    }

    #[test]
    fn test_scan_missing_end() {
        let mut bytes = minimal_image();
        // Blank out the END card.
        let off = 5 * CARD_LEN;
        bytes[off..off + 3].copy_from_slice(b"   ");
        let err = StreamReader::open_memory(bytes, "mem").unwrap_err();
        assert!(matches!(err, Error::EndNotFound(1)));
    }

    #[test]
    fn test_scan_truncated_data() {
        let mut bytes = minimal_image();
        bytes.truncate(BLOCK_LEN + 100);
        let err = StreamReader::open_memory(bytes, "mem").unwrap_err();
        assert!(matches!(err, Error::TruncatedHdu(1)));
    }

    #[test]
    fn test_not_fits() {
        let err = StreamReader::open_memory(b"<html>not fits</html>".to_vec(), "mem").unwrap_err();
        assert!(matches!(err, Error::NotFits(_)));
    }

    #[test]
    fn test_keyword_reads() {
        let mut rdr = StreamReader::open_memory(minimal_image(), "mem").unwrap();
        assert_eq!(rdr.read_keyword_i64("BITPIX").unwrap(), 16);
        assert_eq!(rdr.read_keyword_f64("NAXIS1").unwrap(), 10.0);
        assert!(rdr.read_keyword_i64("MISSING").is_err());
        assert!(rdr.status_message().is_some());
        rdr.clear_error();
        assert!(rdr.status_message().is_none());
    }

    #[test]
    fn test_position_probes() {
        let mut rdr = StreamReader::open_memory(minimal_image(), "mem").unwrap();
        let end = 2 * BLOCK_LEN as u64;
        assert_eq!(rdr.position_at_byte(end).unwrap(), StreamPosition::AtEnd);
        assert_eq!(
            rdr.position_at_byte(end - 1).unwrap(),
            StreamPosition::Within
        );
        assert_eq!(
            rdr.position_at_byte(end + 1).unwrap(),
            StreamPosition::PastEnd
        );
    }

    #[test]
    fn test_ones_complement_known_sums() {
        assert_eq!(ones_complement_sum(&[], 0), 0);
        assert_eq!(ones_complement_sum(&[0, 0, 0, 1], 0), 1);
        // End-around carry: all-ones plus one wraps to one.
        assert_eq!(ones_complement_sum(&[0, 0, 0, 1], u32::MAX), 1);
    }
}
