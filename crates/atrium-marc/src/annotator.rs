//! Builds a base MARC record from a `Work`/`LicensePool` pair (§4.7) and
//! layers per-library customization on top of it: organization code,
//! optional summary/genre fields, and web-client acquisition links.

use chrono::Utc;

use atrium_core::catalog::{Edition, LicensePool, Work};

use crate::record::{non_filing_characters, Field, Indicators, MarcRecord, Subfield};

const AUDIENCE_CHILDREN: &str = "Children";
const AUDIENCE_YOUNG_ADULT: &str = "Young Adult";
const AUDIENCE_ADULTS_ONLY: &str = "Adults Only";

fn audience_term(audience: Option<&str>) -> &'static str {
    match audience {
        Some(AUDIENCE_CHILDREN) => "Juvenile",
        Some(AUDIENCE_YOUNG_ADULT) => "Adolescent",
        Some(AUDIENCE_ADULTS_ONLY) => "Adult",
        _ => "General",
    }
}

fn format_term(content_type: &str, drm_scheme: Option<&str>) -> Option<&'static str> {
    match (content_type, drm_scheme) {
        ("application/epub+zip", None) => Some("EPUB eBook"),
        ("application/epub+zip", Some("http://www.adobe.com/drm/...")) => Some("Adobe EPUB eBook"),
        ("application/pdf", None) => Some("PDF eBook"),
        ("application/pdf", Some("http://www.adobe.com/drm/...")) => Some("Adobe PDF eBook"),
        _ => None,
    }
}

/// Build the distributor-agnostic base record, before any per-library
/// layering is applied.
pub fn marc_record(work: &Work, pool: &LicensePool) -> MarcRecord {
    let edition = &pool_edition(work);
    let mut record = MarcRecord::new(crate::record::leader(false));

    add_control_fields(&mut record, pool, edition);
    add_isbn(&mut record, pool);
    add_title(&mut record, edition);
    add_contributors(&mut record, edition);
    add_publisher(&mut record, edition);
    add_physical_description(&mut record, edition);
    add_audience(&mut record, work);
    add_series(&mut record, edition);
    add_system_details(&mut record);
    add_ebooks_subject(&mut record);
    add_distributor(&mut record, pool);
    add_formats(&mut record, pool);
    add_summary(&mut record, work);
    add_genres(&mut record, work);

    record
}

fn pool_edition(work: &Work) -> Edition {
    work.presentation_edition.clone()
}

fn add_control_fields(record: &mut MarcRecord, pool: &LicensePool, edition: &Edition) {
    record.add_field(Field::control("001", pool.identifier.urn()));
    record.add_field(Field::control("005", Utc::now().format("%Y%m%d%H%M%S.0").to_string()));
    record.add_field(Field::control("006", "m        d        "));

    let file_formats_code = if pool.delivery_mechanisms.len() == 1 { "a" } else { "m" };
    record.add_field(Field::control("007", format!("cr cn ---{file_formats_code}nuuu")));

    let (date_type, date_value) = match edition.issued {
        Some(issued) => ('s', issued.format("%Y").to_string()),
        None => ('n', "    ".to_string()),
    };
    let language = edition.language.as_deref().unwrap_or("eng");
    let data = format!("{}{date_type}{date_value}    xxu                 {language:<3}  ", Utc::now().format("%y%m%d"));
    record.add_field(Field::control("008", data));
}

/// Apply the library's MARC organization code into 003 (§4.7).
pub fn add_marc_organization_code(record: &mut MarcRecord, marc_org: &str) {
    record.add_field(Field::control("003", marc_org));
}

fn add_isbn(record: &mut MarcRecord, pool: &LicensePool) {
    if pool.identifier.kind == atrium_core::IdentifierType::Isbn {
        record.add_field(Field::data("020", Indicators(' ', ' '), vec![Subfield::new('a', pool.identifier.value.clone())]));
    }
}

fn add_title(record: &mut MarcRecord, edition: &Edition) {
    let nfc = non_filing_characters(&edition.title, edition.sort_title.as_deref());

    let mut subfields = vec![Subfield::new('a', edition.title.clone())];
    if let Some(subtitle) = &edition.subtitle {
        subfields.push(Subfield::new('b', subtitle.clone()));
    }
    if let Some(author) = edition.contributors.first().map(|c| c.sort_name.clone().unwrap_or_else(|| c.name.clone())) {
        if edition.contributors.len() == 1 {
            subfields.push(Subfield::new('c', author));
        }
    }

    record.add_field(Field::data("245", Indicators('0', char::from_digit(nfc as u32, 10).unwrap_or('0')), subfields));
}

fn add_contributors(record: &mut MarcRecord, edition: &Edition) {
    if edition.contributors.len() == 1 {
        let contributor = &edition.contributors[0];
        let name = contributor.sort_name.clone().unwrap_or_else(|| contributor.name.clone());
        record.add_field(Field::data("100", Indicators('1', ' '), vec![Subfield::new('a', name)]));
    } else if edition.contributors.len() > 1 {
        for contributor in &edition.contributors {
            let name = contributor.sort_name.clone().unwrap_or_else(|| contributor.name.clone());
            record.add_field(Field::data(
                "700",
                Indicators('1', ' '),
                vec![Subfield::new('a', name), Subfield::new('e', contributor.role.clone())],
            ));
        }
    }
}

fn add_publisher(record: &mut MarcRecord, edition: &Edition) {
    if let Some(publisher) = &edition.publisher {
        let year = edition.issued.map(|d| d.format("%Y").to_string()).unwrap_or_default();
        record.add_field(Field::data(
            "264",
            Indicators(' ', '1'),
            vec![
                Subfield::new('a', "[Place of publication not identified]"),
                Subfield::new('b', publisher.clone()),
                Subfield::new('c', year),
            ],
        ));
    }
}

fn add_distributor(record: &mut MarcRecord, pool: &LicensePool) {
    record.add_field(Field::data("264", Indicators(' ', '2'), vec![Subfield::new('b', pool.data_source_name.clone())]));
}

fn add_physical_description(record: &mut MarcRecord, edition: &Edition) {
    const BOOK: &str = "book";
    const AUDIO: &str = "audio";

    match edition.medium.as_deref() {
        Some(BOOK) => {
            record.add_field(Field::data("300", Indicators(' ', ' '), vec![Subfield::new('a', "1 online resource")]));
            record.add_field(Field::data(
                "336",
                Indicators(' ', ' '),
                vec![Subfield::new('a', "text"), Subfield::new('b', "txt"), Subfield::new('2', "rdacontent")],
            ));
        }
        Some(AUDIO) => {
            record.add_field(Field::data("300", Indicators(' ', ' '), vec![Subfield::new('a', "1 sound file"), Subfield::new('b', "digital")]));
            record.add_field(Field::data(
                "336",
                Indicators(' ', ' '),
                vec![Subfield::new('a', "spoken word"), Subfield::new('b', "spw"), Subfield::new('2', "rdacontent")],
            ));
        }
        _ => {}
    }

    record.add_field(Field::data(
        "337",
        Indicators(' ', ' '),
        vec![Subfield::new('a', "computer"), Subfield::new('b', "c"), Subfield::new('2', "rdamedia")],
    ));
    record.add_field(Field::data(
        "338",
        Indicators(' ', ' '),
        vec![Subfield::new('a', "online resource"), Subfield::new('b', "cr"), Subfield::new('2', "rdacarrier")],
    ));

    let file_type = match edition.medium.as_deref() {
        Some(BOOK) => Some("text file"),
        Some(AUDIO) => Some("audio file"),
        _ => None,
    };
    if let Some(file_type) = file_type {
        record.add_field(Field::data("347", Indicators(' ', ' '), vec![Subfield::new('a', file_type), Subfield::new('2', "rda")]));
    }

    if edition.medium.as_deref() == Some(BOOK) {
        record.add_field(Field::data("380", Indicators(' ', ' '), vec![Subfield::new('a', "eBook"), Subfield::new('2', "tlcgt")]));
    }
}

fn add_audience(record: &mut MarcRecord, work: &Work) {
    let term = audience_term(work.audience.as_deref());
    record.add_field(Field::data("385", Indicators(' ', ' '), vec![Subfield::new('a', term), Subfield::new('2', "tlctarget")]));
}

fn add_series(record: &mut MarcRecord, edition: &Edition) {
    if let Some(series) = &edition.series {
        record.add_field(Field::data("490", Indicators('0', ' '), vec![Subfield::new('a', series.clone())]));
    }
}

fn add_system_details(record: &mut MarcRecord) {
    record.add_field(Field::data("538", Indicators(' ', ' '), vec![Subfield::new('a', "Mode of access: World Wide Web.")]));
}

fn add_formats(record: &mut MarcRecord, pool: &LicensePool) {
    for dm in &pool.delivery_mechanisms {
        if let Some(format) = format_term(&dm.content_type, dm.drm_scheme.as_deref()) {
            record.add_field(Field::data("538", Indicators(' ', ' '), vec![Subfield::new('a', format)]));
        }
    }
}

fn add_summary(record: &mut MarcRecord, work: &Work) {
    if let Some(summary) = &work.summary_text {
        let stripped = strip_html(summary);
        if !stripped.trim().is_empty() {
            record.add_field(Field::data("520", Indicators(' ', ' '), vec![Subfield::new('a', stripped)]));
        }
    }
}

fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn add_genres(record: &mut MarcRecord, work: &Work) {
    for genre in &work.genres {
        record.add_field(Field::data(
            "650",
            Indicators('0', '7'),
            vec![Subfield::new('a', genre.clone()), Subfield::new('2', "Library Simplified")],
        ));
    }
}

fn add_ebooks_subject(record: &mut MarcRecord) {
    record.add_field(Field::data("655", Indicators(' ', '0'), vec![Subfield::new('a', "Electronic books.")]));
}

/// One `web_client_base_url/book/<escaped acquisition link>` 856 entry per
/// configured web client, for `library_short_name`'s view of `work`.
pub fn add_web_client_urls(record: &mut MarcRecord, identifier_urn: &str, library_short_name: &str, base_url: &str, web_client_urls: &[String]) {
    let qualified_identifier = urlencode(identifier_urn);
    let link = format!("{base_url}/{library_short_name}/works/{qualified_identifier}");
    let encoded_link = urlencode(&link);

    for web_client_base_url in web_client_urls {
        let url = format!("{web_client_base_url}/book/{encoded_link}");
        record.add_field(Field::data("856", Indicators('4', '0'), vec![Subfield::new('u', url)]));
    }
}

fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Per-library layering (§4.7): copy the base record, fold in the
/// organization code, drop disabled optional fields, and append this
/// library's web-client links.
#[allow(clippy::too_many_arguments)]
pub fn library_marc_record(
    base: &MarcRecord,
    identifier_urn: &str,
    base_url: &str,
    library_short_name: &str,
    web_client_urls: &[String],
    organization_code: Option<&str>,
    include_summary: bool,
    include_genres: bool,
) -> MarcRecord {
    let mut record = base.clone();

    if let Some(code) = organization_code {
        add_marc_organization_code(&mut record, code);
    }
    if !include_summary {
        record.remove_fields("520");
    }
    if !include_genres {
        record.remove_fields("650");
    }

    add_web_client_urls(&mut record, identifier_urn, library_short_name, base_url, web_client_urls);

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::catalog::{Contributor, DeliveryMechanism};
    use atrium_core::{Identifier, IdentifierType};

    fn sample_work() -> (Work, LicensePool) {
        let edition = Edition {
            primary_identifier: Identifier::new(IdentifierType::Isbn, "9781234567897"),
            title: "The Great Gatsby".to_string(),
            subtitle: None,
            sort_title: Some("Great Gatsby, The".to_string()),
            language: Some("eng".to_string()),
            medium: Some("book".to_string()),
            publisher: Some("Scribner".to_string()),
            issued: None,
            contributors: vec![Contributor { name: "Fitzgerald, F. Scott".to_string(), role: "Author".to_string(), sort_name: Some("Fitzgerald, F. Scott".to_string()) }],
            series: None,
        };
        let work = Work {
            id: "1".to_string(),
            presentation_edition: edition,
            audience: None,
            fiction: Some(true),
            target_age_min: None,
            target_age_max: None,
            genres: vec!["Classics".to_string()],
            summary_text: Some("<p>A classic.</p>".to_string()),
            last_update_time: None,
        };
        let pool = LicensePool {
            collection_id: "c1".to_string(),
            identifier: Identifier::new(IdentifierType::Isbn, "9781234567897"),
            licenses_owned: 1,
            licenses_available: 1,
            licenses_reserved: 0,
            patrons_in_hold_queue: 0,
            unlimited_access: false,
            open_access: false,
            suppressed: false,
            last_checked: None,
            delivery_mechanisms: vec![DeliveryMechanism { content_type: "application/epub+zip".to_string(), drm_scheme: None, rights_uri: None }],
            licenses: vec![],
            data_source_name: "Acme Distributor".to_string(),
        };
        (work, pool)
    }

    #[test]
    fn base_record_carries_isbn_and_title() {
        let (work, pool) = sample_work();
        let record = marc_record(&work, &pool);
        let bytes = record.as_marc();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("9781234567897"));
        assert!(text.contains("The Great Gatsby"));
    }

    #[test]
    fn library_layering_removes_disabled_summary_and_genres() {
        let (work, pool) = sample_work();
        let base = marc_record(&work, &pool);
        let layered = library_marc_record(&base, &pool.identifier.urn(), "https://example.org", "main", &[], Some("ORGCODE"), false, false);
        assert!(layered.fields.iter().all(|f| f.tag() != "520"));
        assert!(layered.fields.iter().all(|f| f.tag() != "650"));
        assert!(layered.fields.iter().any(|f| f.tag() == "003"));
    }

    #[test]
    fn library_layering_adds_web_client_link() {
        let (work, pool) = sample_work();
        let base = marc_record(&work, &pool);
        let layered = library_marc_record(&base, &pool.identifier.urn(), "https://example.org", "main", &["https://read.example.org".to_string()], None, true, true);
        let bytes = layered.as_marc();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("read.example.org"));
    }
}
