//! Shared helpers for integration tests: a writer for small incrementally
//! updated PDFs carrying signatures, document timestamps and `/DSS` data.

#![allow(dead_code)]

use std::fmt::Write as _;

/// Width of each `/ByteRange` number after the leading 0.
const RANGE_WIDTH: usize = 10;

/// Decoded size of every `/Contents` slot.
pub const CONTENTS_SLOT: usize = 64;

/// Builds a PDF revision by revision, the way signing tools append them.
pub struct IncrementalPdf {
    bytes: Vec<u8>,
    next_id: u32,
    prev_xref: usize,
    fields: Vec<u32>,
    dss: Option<u32>,
    ranges: Vec<[usize; 4]>,
    slots: Vec<Slot>,
}

/// Where a signature's `/ByteRange` numbers and `/Contents` hex string sit.
struct Slot {
    range_at: usize,
    contents: Option<(usize, usize)>,
}

impl IncrementalPdf {
    /// A one-page document without signatures.
    pub fn new() -> Self {
        let mut bytes = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let objects = [
            "<</Type/Catalog/Pages 2 0 R>>",
            "<</Type/Pages/Kids[3 0 R]/Count 1>>",
            "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>",
        ];
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push((i as u32 + 1, bytes.len()));
            bytes.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let mut pdf = Self {
            bytes,
            next_id: 4,
            prev_xref: 0,
            fields: Vec::new(),
            dss: None,
            ranges: Vec::new(),
            slots: Vec::new(),
        };
        pdf.finish_revision(&offsets, true);
        pdf
    }

    /// Append a signature revision whose `/Contents` holds `payload`.
    pub fn sign(&mut self, sub_filter: &str, payload: &[u8]) -> &mut Self {
        self.append_signature(sub_filter, payload, Some(CONTENTS_SLOT))
    }

    /// Append a signature revision with a zeroed `/Contents` slot of
    /// `slot_len` bytes, to be filled once the signed bytes are known.
    pub fn reserve(&mut self, sub_filter: &str, slot_len: usize) -> &mut Self {
        self.append_signature(sub_filter, &[], Some(slot_len))
    }

    /// Write `payload` into the `/Contents` slot of the `index`-th signature.
    /// The slot is outside the signed bytes, so nothing else moves.
    pub fn fill_contents(&mut self, index: usize, payload: &[u8]) -> &mut Self {
        let (start, end) = self.slots[index].contents.expect("signature has no /Contents");
        let slot_len = (end - start - 2) / 2;
        assert!(payload.len() <= slot_len, "payload too large for the slot");
        self.bytes[start + 1..end - 1].copy_from_slice(hex_slot(payload, slot_len).as_bytes());
        self
    }

    /// Overwrite the `/ByteRange` of the `index`-th signature in place.
    /// [`byte_ranges`](Self::byte_ranges) keeps reporting the real coverage.
    pub fn set_byte_range(&mut self, index: usize, range: [usize; 4]) -> &mut Self {
        assert_eq!(range[0], 0, "the first offset is written as a literal 0");
        let at = self.slots[index].range_at;
        let patched = format!("{:w$} {:w$} {:w$}", range[1], range[2], range[3], w = RANGE_WIDTH);
        assert_eq!(patched.len(), 3 * RANGE_WIDTH + 2, "range numbers wider than the placeholder");
        self.bytes[at..at + patched.len()].copy_from_slice(patched.as_bytes());
        self
    }

    /// Flip the low bit of the byte at `offset`.
    pub fn flip_byte(&mut self, offset: usize) -> &mut Self {
        self.bytes[offset] ^= 0x01;
        self
    }

    /// Append a signature field whose value carries no `/Contents` at all.
    pub fn sign_without_contents(&mut self, sub_filter: &str) -> &mut Self {
        self.append_signature(sub_filter, &[], None)
    }

    /// Append a `/DSS` revision with the given OCSP responses and CRLs.
    pub fn add_dss(&mut self, ocsps: &[&[u8]], crls: &[&[u8]]) -> &mut Self {
        let mut offsets = Vec::new();
        let ocsp_ids: Vec<u32> = ocsps.iter().map(|blob| self.write_stream(blob, &mut offsets)).collect();
        let crl_ids: Vec<u32> = crls.iter().map(|blob| self.write_stream(blob, &mut offsets)).collect();

        let dss_id = self.allocate();
        offsets.push((dss_id, self.bytes.len()));
        let body = format!("<</OCSPs[{}]/CRLs[{}]>>", refs(&ocsp_ids), refs(&crl_ids));
        self.bytes
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", dss_id, body).as_bytes());
        self.dss = Some(dss_id);

        offsets.push((1, self.bytes.len()));
        self.write_catalog();
        self.finish_revision(&offsets, false);
        self
    }

    /// The finished file.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// `/ByteRange` of every signature appended so far, in order.
    pub fn byte_ranges(&self) -> &[[usize; 4]] {
        &self.ranges
    }

    /// Bytes covered by the `index`-th signature.
    pub fn signed_bytes(&self, index: usize) -> Vec<u8> {
        let [o1, l1, o2, l2] = self.ranges[index];
        let mut out = self.bytes[o1..o1 + l1].to_vec();
        out.extend_from_slice(&self.bytes[o2..o2 + l2]);
        out
    }

    /// Length of the document before the `index`-th signature was written.
    pub fn prior_len(&self, index: usize) -> usize {
        self.ranges[index][1]
    }

    fn append_signature(&mut self, sub_filter: &str, payload: &[u8], slot_len: Option<usize>) -> &mut Self {
        assert!(payload.len() <= slot_len.unwrap_or(0), "payload too large for the slot");
        let field_id = self.allocate();
        let value_id = self.allocate();
        self.fields.push(field_id);
        let index = self.fields.len();

        let mut offsets = vec![(1, self.bytes.len())];
        self.write_catalog();

        offsets.push((field_id, self.bytes.len()));
        self.bytes.extend_from_slice(
            format!(
                "{} 0 obj\n<</FT/Sig/T(Signature{})/V {} 0 R/Subtype/Widget/Rect[0 0 0 0]/P 3 0 R>>\nendobj\n",
                field_id, index, value_id
            )
            .as_bytes(),
        );

        offsets.push((value_id, self.bytes.len()));
        let kind = if sub_filter == "ETSI.RFC3161" { "DocTimeStamp" } else { "Sig" };
        self.bytes.extend_from_slice(
            format!(
                "{} 0 obj\n<</Type/{}/Filter/Adobe.PPKLite/SubFilter/{}/M(D:20240315120000Z)",
                value_id, kind, sub_filter
            )
            .as_bytes(),
        );

        self.bytes.extend_from_slice(b"/ByteRange[0 ");
        let range_at = self.bytes.len();
        let placeholder = format!("{:w$} {:w$} {:w$}", 0, 0, 0, w = RANGE_WIDTH);
        self.bytes.extend_from_slice(placeholder.as_bytes());
        self.bytes.extend_from_slice(b"]");

        let mut contents = None;
        if let Some(slot_len) = slot_len {
            self.bytes.extend_from_slice(b"/Contents<");
            let start = self.bytes.len() - 1;
            self.bytes.extend_from_slice(hex_slot(payload, slot_len).as_bytes());
            self.bytes.push(b'>');
            contents = Some((start, self.bytes.len()));
        }
        self.bytes.extend_from_slice(b">>\nendobj\n");
        self.finish_revision(&offsets, false);

        let total = self.bytes.len();
        let (start, end) = contents.unwrap_or((total, total));
        let range = [0, start, end, total - end];
        let filled = format!("{:w$} {:w$} {:w$}", range[1], range[2], range[3], w = RANGE_WIDTH);
        self.bytes[range_at..range_at + filled.len()].copy_from_slice(filled.as_bytes());
        self.ranges.push(range);
        self.slots.push(Slot { range_at, contents });
        self
    }

    fn write_stream(&mut self, data: &[u8], offsets: &mut Vec<(u32, usize)>) -> u32 {
        let id = self.allocate();
        offsets.push((id, self.bytes.len()));
        self.bytes
            .extend_from_slice(format!("{} 0 obj\n<</Length {}>>\nstream\n", id, data.len()).as_bytes());
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\nendstream\nendobj\n");
        id
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn write_catalog(&mut self) {
        let mut body = String::from("<</Type/Catalog/Pages 2 0 R");
        if !self.fields.is_empty() {
            let _ = write!(body, "/AcroForm<</Fields[{}]/SigFlags 3>>", refs(&self.fields));
        }
        if let Some(dss) = self.dss {
            let _ = write!(body, "/DSS {} 0 R", dss);
        }
        body.push_str(">>");
        self.bytes
            .extend_from_slice(format!("1 0 obj\n{}\nendobj\n", body).as_bytes());
    }

    fn finish_revision(&mut self, offsets: &[(u32, usize)], first: bool) {
        let xref_at = self.bytes.len();
        let mut xref = String::from("xref\n");
        if first {
            let _ = write!(xref, "0 {}\n0000000000 65535 f \n", offsets.len() + 1);
            for (_, off) in offsets {
                let _ = write!(xref, "{:010} 00000 n \n", off);
            }
        } else {
            for (id, off) in offsets {
                let _ = write!(xref, "{} 1\n{:010} 00000 n \n", id, off);
            }
        }
        let prev = if first { String::new() } else { format!("/Prev {}", self.prev_xref) };
        let _ = write!(
            xref,
            "trailer\n<</Size {}/Root 1 0 R{}>>\nstartxref\n{}\n%%EOF\n",
            self.next_id, prev, xref_at
        );
        self.bytes.extend_from_slice(xref.as_bytes());
        self.prev_xref = xref_at;
    }
}

impl Default for IncrementalPdf {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_slot(payload: &[u8], slot_len: usize) -> String {
    let mut hex = String::with_capacity(slot_len * 2);
    for i in 0..slot_len {
        let _ = write!(hex, "{:02X}", payload.get(i).copied().unwrap_or(0));
    }
    hex
}

fn refs(ids: &[u32]) -> String {
    ids.iter().map(|id| format!("{} 0 R", id)).collect::<Vec<_>>().join(" ")
}

/// Initialise logging once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
