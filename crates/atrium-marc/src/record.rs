//! ISO 2709 record construction. A record is a leader, a directory of
//! (tag, length, starting-offset) triples, and the field data itself,
//! joined with the field terminator (0x1E) and closed by the record
//! terminator (0x1D). Subfields within a field are joined by the subfield
//! delimiter (0x1F).

const SUBFIELD_DELIMITER: char = '\u{1F}';
const FIELD_TERMINATOR: char = '\u{1E}';
const RECORD_TERMINATOR: char = '\u{1D}';

#[derive(Clone, Debug)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

impl Subfield {
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Self { code, value: value.into() }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Indicators(pub char, pub char);

/// A control field (tag < 010, raw `data`) or a data field (tag >= 010,
/// indicators plus subfields).
#[derive(Clone, Debug)]
pub enum Field {
    Control { tag: &'static str, data: String },
    Data { tag: &'static str, indicators: Indicators, subfields: Vec<Subfield> },
}

impl Field {
    pub fn control(tag: &'static str, data: impl Into<String>) -> Self {
        Self::Control { tag, data: data.into() }
    }

    pub fn data(tag: &'static str, indicators: Indicators, subfields: Vec<Subfield>) -> Self {
        Self::Data { tag, indicators, subfields }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Control { tag, .. } => tag,
            Self::Data { tag, .. } => tag,
        }
    }

    fn body(&self) -> String {
        match self {
            Self::Control { data, .. } => data.clone(),
            Self::Data { indicators, subfields, .. } => {
                let mut body = String::new();
                body.push(indicators.0);
                body.push(indicators.1);
                for subfield in subfields {
                    body.push(SUBFIELD_DELIMITER);
                    body.push(subfield.code);
                    body.push_str(&subfield.value);
                }
                body
            }
        }
    }
}

/// Leader positions 5 (record status) and 6-7 (type + bibliographic level)
/// identify every MARC record this engine writes: `n`/`c` (new/corrected),
/// type `a` (language material), level `m` (monograph).
pub fn leader(revised: bool) -> String {
    let record_status = if revised { 'c' } else { 'n' };
    format!("00000{record_status}am  2200000   4500")
}

/// A mutable ISO 2709 record under construction.
#[derive(Clone, Debug)]
pub struct MarcRecord {
    pub leader: String,
    pub fields: Vec<Field>,
}

impl MarcRecord {
    pub fn new(leader: String) -> Self {
        Self { leader, fields: Vec::new() }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn remove_fields(&mut self, tag: &str) {
        self.fields.retain(|f| f.tag() != tag);
    }

    pub fn set_revised(&mut self, revised: bool) {
        let status = if revised { 'c' } else { 'n' };
        self.leader.replace_range(5..6, &status.to_string());
    }

    /// Serialize to ISO 2709 bytes, computing the leader's record-length and
    /// base-address-of-data positions from the assembled directory and data.
    pub fn as_marc(&self) -> Vec<u8> {
        let mut directory = String::new();
        let mut data = String::new();

        for field in &self.fields {
            let body = field.body();
            let entry = format!("{:0<3}{:04}{:05}", field.tag(), body.len() + 1, data.len());
            directory.push_str(&entry);
            data.push_str(&body);
            data.push(FIELD_TERMINATOR);
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = 24 + directory.len();
        let record_length = base_address + data.len() + 1;

        let mut leader = self.leader.clone();
        leader.replace_range(0..5, &format!("{record_length:05}"));
        leader.replace_range(12..17, &format!("{base_address:05}"));

        let mut out = String::new();
        out.push_str(&leader);
        out.push_str(&directory);
        out.push_str(&data);
        out.push(RECORD_TERMINATOR);

        out.into_bytes()
    }
}

/// Positions in `title` where non-filing characters end, inferred by
/// comparing against `sort_title` (§9 Open Question). MARC only supports a
/// single digit (0-9) here; ambiguous or unsupported results fall back to 0.
pub fn non_filing_characters(title: &str, sort_title: Option<&str>) -> u8 {
    let Some(sort_title) = sort_title else { return 0 };
    if title == sort_title {
        return 0;
    }
    let Some(comma_idx) = sort_title.rfind(',') else { return 0 };
    let stemmed = &sort_title[..comma_idx];

    match title.find(stemmed) {
        Some(byte_idx) => {
            let char_idx = title[..byte_idx].chars().count();
            if char_idx > 9 {
                0
            } else {
                char_idx as u8
            }
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_filing_characters_counts_leading_article() {
        assert_eq!(non_filing_characters("The Great Gatsby", Some("Great Gatsby, The")), 4);
    }

    #[test]
    fn non_filing_characters_falls_back_to_zero_without_comma() {
        assert_eq!(non_filing_characters("The Great Gatsby", Some("Great Gatsby")), 0);
    }

    #[test]
    fn non_filing_characters_falls_back_to_zero_when_equal() {
        assert_eq!(non_filing_characters("Gatsby", Some("Gatsby")), 0);
    }

    #[test]
    fn record_leader_carries_computed_length_and_base_address() {
        let mut record = MarcRecord::new(leader(false));
        record.add_field(Field::control("001", "urn:isbn:1234567890"));
        let bytes = record.as_marc();
        assert_eq!(&bytes[5..6], b"n");
        assert_eq!(&bytes[6..8], b"am");
        assert_eq!(*bytes.last().unwrap(), b'\x1d');
    }

    #[test]
    fn set_revised_flips_record_status() {
        let mut record = MarcRecord::new(leader(false));
        record.set_revised(true);
        assert!(record.leader.starts_with("00000c"));
    }
}
