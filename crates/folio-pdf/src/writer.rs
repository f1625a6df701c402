//! Indirect object store: numbering, offsets, streams and the xref table

use crate::security::SecurityHandler;
use crate::text::escape;
use std::collections::BTreeMap;

/// Object number of the page tree root
pub(crate) const PAGES_ROOT: u32 = 1;
/// Object number of the shared resource dictionary
pub(crate) const RESOURCES: u32 = 2;

/// Serialized output under construction
///
/// Objects 1 and 2 are reserved and written late; every other object is
/// numbered in the order it is started.
#[derive(Debug)]
pub(crate) struct ObjectWriter {
    buffer: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
    /// Highest allocated object number
    n: u32,
    /// Object whose body is being written, used to key encryption
    current: u32,
    security: Option<SecurityHandler>,
}

impl ObjectWriter {
    pub fn new(security: Option<SecurityHandler>) -> Self {
        Self {
            buffer: Vec::new(),
            offsets: BTreeMap::new(),
            n: RESOURCES,
            current: 0,
            security,
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Highest allocated object number
    pub fn last_object(&self) -> u32 {
        self.n
    }

    pub fn security(&self) -> Option<&SecurityHandler> {
        self.security.as_ref()
    }

    /// Recorded offset of each object, ascending by number
    #[cfg(test)]
    pub fn offsets(&self) -> &BTreeMap<u32, usize> {
        &self.offsets
    }

    /// Append raw bytes followed by a newline
    pub fn out(&mut self, line: impl AsRef<[u8]>) {
        self.buffer.extend_from_slice(line.as_ref());
        self.buffer.push(b'\n');
    }

    /// Allocate the next object number and write its start token
    pub fn new_obj(&mut self) -> u32 {
        self.n += 1;
        let n = self.n;
        self.start_obj(n);
        n
    }

    /// Write the start token of a reserved object
    pub fn begin_reserved(&mut self, n: u32) {
        self.start_obj(n);
    }

    fn start_obj(&mut self, n: u32) {
        self.offsets.insert(n, self.buffer.len());
        self.current = n;
        self.out(format!("{n} 0 obj"));
    }

    pub fn end_obj(&mut self) {
        self.out("endobj");
    }

    /// Write a stream body, encrypted for the current object when protection is on
    pub fn put_stream(&mut self, data: &[u8]) {
        let body = match self.security.as_mut() {
            Some(security) => security.encrypt(self.current, data),
            None => data.to_vec(),
        };
        self.out("stream");
        self.out(body);
        self.out("endstream");
    }

    /// Write a complete stream object; `entries` are the dictionary keys before `/Length`
    pub fn put_stream_object(&mut self, entries: &str, data: &[u8]) -> u32 {
        let n = self.new_obj();
        self.out(format!("<<{entries}/Length {}>>", data.len()));
        self.put_stream(data);
        self.end_obj();
        n
    }

    /// A literal string `( ... )` for the current object, encrypted and escaped
    pub fn text_string(&mut self, data: &[u8]) -> Vec<u8> {
        let body = match self.security.as_mut() {
            Some(security) => security.encrypt(self.current, data),
            None => data.to_vec(),
        };
        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(b'(');
        out.extend_from_slice(&escape(&body));
        out.push(b')');
        out
    }

    /// Write the cross-reference table and trailer, ending the file
    pub fn put_xref_and_trailer(&mut self, root: u32, info: u32, encrypt: Option<u32>) {
        let xref_offset = self.buffer.len();
        self.out("xref");
        self.out(format!("0 {}", self.n + 1));
        self.out("0000000000 65535 f ");
        for i in 1..=self.n {
            let offset = match self.offsets.get(&i) {
                Some(offset) => *offset,
                None => {
                    log::warn!("object {i} was never written");
                    0
                }
            };
            self.out(format!("{offset:010} 00000 n "));
        }

        self.out("trailer");
        self.out("<<");
        self.out(format!("/Size {}", self.n + 1));
        self.out(format!("/Root {root} 0 R"));
        self.out(format!("/Info {info} 0 R"));
        if let Some(encrypt) = encrypt {
            self.out(format!("/Encrypt {encrypt} 0 R"));
            self.out("/ID [()()]");
        }
        self.out(">>");
        self.out("startxref");
        self.out(xref_offset.to_string());
        self.out("%%EOF");
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Permissions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_numbering_starts_after_reserved() {
        let mut writer = ObjectWriter::new(None);
        assert_eq!(writer.new_obj(), 3);
        writer.end_obj();
        assert_eq!(writer.new_obj(), 4);
        writer.end_obj();
        assert_eq!(writer.last_object(), 4);
    }

    #[test]
    fn test_offsets_point_at_start_tokens() {
        let mut writer = ObjectWriter::new(None);
        writer.out("%PDF-1.3");
        let a = writer.new_obj();
        writer.out("<</Type /Example>>");
        writer.end_obj();
        writer.begin_reserved(PAGES_ROOT);
        writer.out("<</Type /Pages /Kids [] /Count 0>>");
        writer.end_obj();
        let offsets = writer.offsets().clone();
        let bytes = writer.into_bytes();

        let at = |n: u32| offsets[&n];
        assert!(bytes[at(a)..].starts_with(b"3 0 obj\n"));
        assert!(bytes[at(PAGES_ROOT)..].starts_with(b"1 0 obj\n"));
    }

    #[test]
    fn test_stream_object_length() {
        let mut writer = ObjectWriter::new(None);
        writer.put_stream_object("/Filter /FlateDecode ", b"abcdef");
        let text = String::from_utf8(writer.into_bytes()).unwrap();
        assert_eq!(
            text,
            "3 0 obj\n<</Filter /FlateDecode /Length 6>>\nstream\nabcdef\nendstream\nendobj\n"
        );
    }

    #[test]
    fn test_xref_and_trailer_layout() {
        let mut writer = ObjectWriter::new(None);
        writer.out("%PDF-1.3");
        writer.begin_reserved(PAGES_ROOT);
        writer.end_obj();
        writer.begin_reserved(RESOURCES);
        writer.end_obj();
        let info = writer.new_obj();
        writer.end_obj();
        let root = writer.new_obj();
        writer.end_obj();
        writer.put_xref_and_trailer(root, info, None);
        let text = String::from_utf8(writer.into_bytes()).unwrap();

        let xref_at = text.find("xref\n").unwrap();
        let expected = format!(
            "xref\n0 5\n0000000000 65535 f \n\
             0000000009 00000 n \n\
             0000000024 00000 n \n\
             0000000039 00000 n \n\
             0000000054 00000 n \n\
             trailer\n<<\n/Size 5\n/Root 4 0 R\n/Info 3 0 R\n>>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        assert_eq!(&text[xref_at..], expected);
    }

    #[test]
    fn test_encrypted_trailer() {
        let security = SecurityHandler::new(Permissions::PRINT, "", "owner");
        let mut writer = ObjectWriter::new(Some(security));
        let info = writer.new_obj();
        writer.end_obj();
        let root = writer.new_obj();
        writer.end_obj();
        let encrypt = writer.new_obj();
        writer.end_obj();
        writer.put_xref_and_trailer(root, info, Some(encrypt));
        let text = String::from_utf8_lossy(&writer.into_bytes()).into_owned();
        assert!(text.contains("/Encrypt 5 0 R\n/ID [()()]\n"));
    }

    #[test]
    fn test_text_string_plain_and_encrypted() {
        let mut plain = ObjectWriter::new(None);
        plain.new_obj();
        assert_eq!(plain.text_string(b"a(b)"), b"(a\\(b\\))".to_vec());

        let security = SecurityHandler::new(Permissions::PRINT, "", "owner");
        let mut expected = security.clone();
        let mut writer = ObjectWriter::new(Some(security));
        let n = writer.new_obj();
        let encrypted = expected.encrypt(n, b"Title");
        let mut wrapped = vec![b'('];
        wrapped.extend_from_slice(&escape(&encrypted));
        wrapped.push(b')');
        assert_eq!(writer.text_string(b"Title"), wrapped);
    }
}
