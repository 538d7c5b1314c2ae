//! The contact value type handed out by the picker.
//!
//! A [`ContactRecord`] is built once, by translating a raw contact from a
//! [`ContactSource`](crate::source::ContactSource), and never mutated again.
//! Fields that fail to translate are left empty instead of failing the record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::source::FetchField;

/// A value with its TYPE label, e.g. a phone number labelled `cell`.
///
/// An entry without a label keeps an empty label; it is never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledValue {
    pub value: String,
    pub label: String,
}

impl LabeledValue {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub label: String,
}

impl PostalAddress {
    pub fn is_empty(&self) -> bool {
        self.street.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.postal_code.is_empty()
            && self.country.is_empty()
    }
}

/// Which record attribute a list row shows under the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleField {
    #[default]
    #[serde(alias = "phone")]
    PhoneNumber,
    Email,
    Birthday,
    Organization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    id: Option<String>,
    given_name: String,
    family_name: String,
    organization: String,
    #[serde(skip)]
    birthday: Option<Date>,
    birthday_string: Option<String>,
    phone_numbers: Vec<LabeledValue>,
    emails: Vec<LabeledValue>,
    postal_addresses: Vec<PostalAddress>,
    #[serde(skip)]
    thumbnail: Option<Arc<[u8]>>,
    #[serde(skip)]
    image: Option<Arc<[u8]>>,
}

impl ContactRecord {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            id: None,
            given_name: given_name.into(),
            family_name: family_name.into(),
            organization: String::new(),
            birthday: None,
            birthday_string: None,
            phone_numbers: Vec::new(),
            emails: Vec::new(),
            postal_addresses: Vec::new(),
            thumbnail: None,
            image: None,
        }
    }

    /// Stable identifier from the source. Blank identifiers are treated as
    /// absent so the record stays ephemeral.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.id = if id.trim().is_empty() { None } else { Some(id) };
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_birthday(mut self, birthday: Date) -> Self {
        self.birthday_string = format_birthday(birthday);
        self.birthday = self.birthday_string.as_ref().map(|_| birthday);
        self
    }

    pub fn with_phone(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.phone_numbers.push(LabeledValue::new(value, label));
        self
    }

    pub fn with_email(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.emails.push(LabeledValue::new(value, label));
        self
    }

    pub fn with_postal_address(mut self, address: PostalAddress) -> Self {
        self.postal_addresses.push(address);
        self
    }

    pub fn with_thumbnail(mut self, data: Vec<u8>) -> Self {
        self.thumbnail = Some(Arc::from(data));
        self
    }

    pub fn with_image(mut self, data: Vec<u8>) -> Self {
        self.image = Some(Arc::from(data));
        self
    }

    /// Clear every attribute not covered by `fields`. Identity is always kept.
    pub fn restricted_to(mut self, fields: &[FetchField]) -> Self {
        let wants = |field: FetchField| fields.contains(&field);
        if !wants(FetchField::GivenName) {
            self.given_name.clear();
        }
        if !wants(FetchField::FamilyName) {
            self.family_name.clear();
        }
        if !wants(FetchField::Organization) {
            self.organization.clear();
        }
        if !wants(FetchField::Birthday) {
            self.birthday = None;
            self.birthday_string = None;
        }
        if !wants(FetchField::Thumbnail) {
            self.thumbnail = None;
        }
        if !wants(FetchField::Image) {
            self.image = None;
        }
        if !wants(FetchField::PhoneNumbers) {
            self.phone_numbers.clear();
        }
        if !wants(FetchField::EmailAddresses) {
            self.emails.clear();
        }
        if !wants(FetchField::PostalAddresses) {
            self.postal_addresses.clear();
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn birthday(&self) -> Option<Date> {
        self.birthday
    }

    /// Birthday formatted as `MMM d`, e.g. `Oct 4`.
    pub fn birthday_string(&self) -> Option<&str> {
        self.birthday_string.as_deref()
    }

    pub fn phone_numbers(&self) -> &[LabeledValue] {
        &self.phone_numbers
    }

    pub fn emails(&self) -> &[LabeledValue] {
        &self.emails
    }

    pub fn postal_addresses(&self) -> &[PostalAddress] {
        &self.postal_addresses
    }

    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// First character of the given name followed by the first character of
    /// the family name. `None` when both are empty.
    pub fn initials(&self) -> Option<String> {
        let initials: String = self
            .given_name
            .chars()
            .next()
            .into_iter()
            .chain(self.family_name.chars().next())
            .collect();
        if initials.is_empty() {
            None
        } else {
            Some(initials)
        }
    }

    pub fn subtitle(&self, field: SubtitleField) -> Option<&str> {
        match field {
            SubtitleField::PhoneNumber => self.phone_numbers.first().map(|p| p.value.as_str()),
            SubtitleField::Email => self.emails.first().map(|e| e.value.as_str()),
            SubtitleField::Birthday => self.birthday_string(),
            SubtitleField::Organization => {
                Some(self.organization.as_str()).filter(|org| !org.is_empty())
            }
        }
    }
}

fn format_birthday(date: Date) -> Option<String> {
    date.format(format_description!("[month repr:short] [day padding:none]"))
        .ok()
}
