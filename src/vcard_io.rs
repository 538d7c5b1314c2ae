use anyhow::{anyhow, bail, Context, Result};
use base64::prelude::*;
use time::{Date, Month};
use tracing::debug;
use vcard4::parameter::{Parameters, TypeParameter};
use vcard4::property::TextOrUriProperty;
use vcard4::{parse, Vcard};

use crate::record::{ContactRecord, PostalAddress};

/// Year used for birthdays stored without one. A leap year, so `--0229`
/// stays valid.
const YEARLESS_BIRTHDAY_YEAR: i32 = 2000;

/// Parse a UTF-8 string into `Vcard` values.
pub fn parse_str(input: &str) -> Result<Vec<Vcard>> {
    parse(input)
        .map_err(|err| anyhow!(err))
        .context("parsing vCard data")
}

/// Retrieve the UID value as a string if present.
pub fn card_uid(card: &Vcard) -> Option<String> {
    match &card.uid {
        Some(TextOrUriProperty::Text(text)) => Some(text.value.clone()),
        Some(TextOrUriProperty::Uri(uri)) => Some(uri.value.to_string()),
        None => None,
    }
}

/// Translate a parsed card into a [`ContactRecord`].
///
/// Attributes that cannot be translated are left empty; a card never fails
/// as a whole.
pub fn to_record(card: &Vcard, thumbnail: Option<Vec<u8>>) -> ContactRecord {
    let (given, family) = card_names(card);
    let mut record = ContactRecord::new(given, family);

    if let Some(uid) = card_uid(card) {
        record = record.with_id(uid);
    }

    if let Some(org) = card
        .org
        .first()
        .and_then(|prop| prop.value.first())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
    {
        record = record.with_organization(org);
    }

    if let Some(bday) = &card.bday {
        let raw = bday.to_string();
        match parse_birthday(&raw) {
            Some(date) => record = record.with_birthday(date),
            None => debug!(value = %raw, "ignoring unparseable BDAY"),
        }
    }

    for prop in &card.tel {
        let (value, params) = match prop {
            TextOrUriProperty::Text(text) => (text.value.clone(), text.parameters.as_ref()),
            TextOrUriProperty::Uri(uri) => (uri.value.to_string(), uri.parameters.as_ref()),
        };
        let value = strip_tel_scheme(&value).trim().to_string();
        if !value.is_empty() {
            record = record.with_phone(value, type_label(params));
        }
    }

    for prop in &card.email {
        let value = prop.value.trim();
        if !value.is_empty() {
            record = record.with_email(value, type_label(prop.parameters.as_ref()));
        }
    }

    for prop in &card.address {
        let address = split_address(&prop.value.to_string(), type_label(prop.parameters.as_ref()));
        if !address.is_empty() {
            record = record.with_postal_address(address);
        }
    }

    if let Some(image) = card.photo.iter().find_map(embedded_photo) {
        record = record.with_image(image);
    }

    if let Some(thumbnail) = thumbnail {
        record = record.with_thumbnail(thumbnail);
    }

    record
}

fn card_names(card: &Vcard) -> (String, String) {
    let component = |idx: usize| -> String {
        card.name
            .as_ref()
            .and_then(|name| name.value.get(idx))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };
    let family = component(0);
    let given = component(1);

    if given.is_empty() && family.is_empty() {
        let formatted = card
            .formatted_name
            .first()
            .map(|prop| prop.value.trim().to_string())
            .unwrap_or_default();
        return (formatted, String::new());
    }
    (given, family)
}

/// Parse a BDAY value: `YYYYMMDD`, `YYYY-MM-DD`, `--MMDD` or `--MM-DD`,
/// optionally followed by a `T` time part which is ignored.
pub fn parse_birthday(raw: &str) -> Option<Date> {
    let date_part = raw.trim().split('T').next()?;

    let (year, month_day) = match date_part.strip_prefix("--") {
        Some(rest) => (YEARLESS_BIRTHDAY_YEAR, rest.replace('-', "")),
        None => {
            let digits = date_part.replace('-', "");
            if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let year: i32 = digits[..4].parse().ok()?;
            (year, digits[4..].to_string())
        }
    };

    if month_day.len() != 4 || !month_day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u8 = month_day[..2].parse().ok()?;
    let day: u8 = month_day[2..].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

fn strip_tel_scheme(value: &str) -> &str {
    let trimmed = value.trim_start();
    match trimmed.get(..4) {
        Some(scheme) if scheme.eq_ignore_ascii_case("tel:") => &trimmed[4..],
        _ => trimmed,
    }
}

/// TYPE values joined with `/`, lowercased. Empty when the property has none.
fn type_label(params: Option<&Parameters>) -> String {
    params
        .and_then(|params| params.types.as_ref())
        .map(|types| {
            types
                .iter()
                .map(type_parameter_to_string)
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn type_parameter_to_string(param: &TypeParameter) -> String {
    match param {
        TypeParameter::Telephone(value) => value.to_string().to_ascii_lowercase(),
        TypeParameter::Related(value) => value.to_string().to_ascii_lowercase(),
        TypeParameter::Home => "home".to_string(),
        TypeParameter::Work => "work".to_string(),
        TypeParameter::Extension(value) => value.to_string().to_ascii_lowercase(),
    }
}

/// ADR components: post office box, extended address, street, locality,
/// region, postal code, country.
fn split_address(value: &str, label: String) -> PostalAddress {
    let parts: Vec<&str> = value.split(';').map(str::trim).collect();
    let part = |idx: usize| parts.get(idx).copied().unwrap_or_default().to_string();
    PostalAddress {
        street: part(2),
        city: part(3),
        state: part(4),
        postal_code: part(5),
        country: part(6),
        label,
    }
}

fn embedded_photo(prop: &TextOrUriProperty) -> Option<Vec<u8>> {
    let value = match prop {
        TextOrUriProperty::Text(text) => text.value.clone(),
        TextOrUriProperty::Uri(uri) => uri.value.to_string(),
    };
    let decoded = if value.trim_start().starts_with("data:") {
        parse_data_uri(value.trim())
    } else if value.contains("://") {
        return None;
    } else {
        decode_base64_blob(&value)
    };
    match decoded {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(err) => {
            debug!("ignoring PHOTO: {err:#}");
            None
        }
    }
}

fn parse_data_uri(input: &str) -> Result<Vec<u8>> {
    let mut parts = input.splitn(2, ',');
    let meta = parts
        .next()
        .ok_or_else(|| anyhow!("invalid data URI in PHOTO value"))?;
    let data = parts
        .next()
        .ok_or_else(|| anyhow!("data URI is missing payload"))?;

    let is_base64 = meta
        .split(';')
        .any(|segment| segment.eq_ignore_ascii_case("base64"));
    if !is_base64 {
        bail!("only base64 data URIs are supported for PHOTO");
    }
    decode_base64_blob(data)
}

fn decode_base64_blob(value: &str) -> Result<Vec<u8>> {
    let filtered: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if filtered.is_empty() {
        return Ok(Vec::new());
    }
    BASE64_STANDARD
        .decode(filtered)
        .context("failed to decode embedded PHOTO data as base64")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_record(input: &str) -> ContactRecord {
        let cards = parse_str(input).expect("valid vCard");
        to_record(&cards[0], None)
    }

    #[test]
    fn translates_names_and_identity() {
        let record = first_record(
            "BEGIN:VCARD\r\nVERSION:4.0\r\nUID:abc-1\r\nFN:Amy Zed\r\nN:Zed;Amy;;;\r\nORG:Acme;Research\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.id(), Some("abc-1"));
        assert_eq!(record.given_name(), "Amy");
        assert_eq!(record.family_name(), "Zed");
        assert_eq!(record.organization(), "Acme");
    }

    #[test]
    fn formatted_name_stands_in_for_missing_n() {
        let record =
            first_record("BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Cher\r\nEND:VCARD\r\n");
        assert_eq!(record.given_name(), "Cher");
        assert_eq!(record.family_name(), "");
        assert_eq!(record.id(), None);
    }

    #[test]
    fn phones_and_emails_keep_labels_and_order() {
        let record = first_record(
            "BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Amy Zed\r\nN:Zed;Amy;;;\r\nTEL;TYPE=cell:555-0100\r\nTEL:555-0199\r\nEMAIL;TYPE=work:amy@example.com\r\nEND:VCARD\r\n",
        );
        let phones = record.phone_numbers();
        assert_eq!(phones.len(), 2);
        assert_eq!(phones[0].value, "555-0100");
        assert_eq!(phones[0].label, "cell");
        assert_eq!(phones[1].value, "555-0199");
        assert_eq!(phones[1].label, "");
        assert_eq!(record.emails()[0].value, "amy@example.com");
        assert_eq!(record.emails()[0].label, "work");
    }

    #[test]
    fn address_components_are_split() {
        let record = first_record(
            "BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Amy Zed\r\nADR;TYPE=home:;;1 Main St;Springfield;IL;62701;USA\r\nEND:VCARD\r\n",
        );
        let address = &record.postal_addresses()[0];
        assert_eq!(address.street, "1 Main St");
        assert_eq!(address.city, "Springfield");
        assert_eq!(address.state, "IL");
        assert_eq!(address.postal_code, "62701");
        assert_eq!(address.country, "USA");
        assert_eq!(address.label, "home");
    }

    #[test]
    fn birthday_formats() {
        let expected = Date::from_calendar_date(1990, Month::October, 4).unwrap();
        assert_eq!(parse_birthday("19901004"), Some(expected));
        assert_eq!(parse_birthday("1990-10-04"), Some(expected));
        assert_eq!(parse_birthday("1990-10-04T08:00:00Z"), Some(expected));
        assert_eq!(
            parse_birthday("--1004"),
            Date::from_calendar_date(2000, Month::October, 4).ok()
        );
        assert_eq!(
            parse_birthday("--02-29"),
            Date::from_calendar_date(2000, Month::February, 29).ok()
        );
    }

    #[test]
    fn malformed_birthdays_are_rejected() {
        assert_eq!(parse_birthday(""), None);
        assert_eq!(parse_birthday("circa 1800"), None);
        assert_eq!(parse_birthday("19901304"), None);
        assert_eq!(parse_birthday("1990-02-30"), None);
        assert_eq!(parse_birthday("--13"), None);
    }

    #[test]
    fn tel_scheme_is_stripped() {
        assert_eq!(strip_tel_scheme("tel:+1-555-0100"), "+1-555-0100");
        assert_eq!(strip_tel_scheme("TEL:123"), "123");
        assert_eq!(strip_tel_scheme("555"), "555");
        assert_eq!(strip_tel_scheme("aé€123"), "aé€123");
        assert_eq!(strip_tel_scheme("日本"), "日本");
    }

    #[test]
    fn non_ascii_tel_is_kept_verbatim() {
        let record = first_record(
            "BEGIN:VCARD\r\nVERSION:4.0\r\nUID:7\r\nFN:Amy Zed\r\nN:Zed;Amy;;;\r\nTEL;VALUE=text:aé€123\r\nEMAIL:amy@example.com\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.phone_numbers()[0].value, "aé€123");
        assert_eq!(record.emails().len(), 1);
    }

    #[test]
    fn data_uri_payload_is_decoded() {
        let encoded = BASE64_STANDARD.encode([1u8, 2, 3, 4]);
        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(parse_data_uri(&uri).unwrap(), vec![1, 2, 3, 4]);
        assert!(parse_data_uri("data:image/png,raw").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn base64_blob_ignores_whitespace() {
        assert_eq!(decode_base64_blob("AQID\r\n BA==").unwrap(), vec![1, 2, 3, 4]);
        assert!(decode_base64_blob("not base64!").is_err());
        assert!(decode_base64_blob("  ").unwrap().is_empty());
    }
}
