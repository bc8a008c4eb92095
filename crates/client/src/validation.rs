//! Field checks for the create-request form, run before any operation is
//! issued.

use std::collections::BTreeMap;
use std::fmt;

use relieflink_shared::{NeedInput, SelectOption};
use thiserror::Error;

const CONTACT_NUMBER_DIGITS: usize = 10;

/// Raw form values as the inputs hand them over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestForm {
    pub contact_person_name: String,
    pub contact_number: String,
    pub city: Option<SelectOption>,
    pub number_of_people: String,
    pub categories: Vec<SelectOption>,
    pub agree_to_terms: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    ContactPersonName,
    ContactNumber,
    City,
    NumberOfPeople,
    Categories,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::ContactPersonName => "contactPersonName",
            Field::ContactNumber => "contactNumber",
            Field::City => "city",
            Field::NumberOfPeople => "numberOfPeople",
            Field::Categories => "categories",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} field(s) need attention", .0.len())]
pub struct ValidationErrors(BTreeMap<Field, &'static str>);

impl ValidationErrors {
    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.0.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.0.iter().map(|(f, m)| (*f, *m))
    }

    fn add(&mut self, field: Field, message: &'static str) {
        self.0.entry(field).or_insert(message);
    }
}

/// Check every field and build the mutation input. The terms checkbox is not
/// a field error; the submit flow handles it separately.
pub fn validate_request(form: &RequestForm) -> Result<NeedInput, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = form.contact_person_name.trim();
    if name.is_empty() {
        errors.add(Field::ContactPersonName, "Contact person name is required");
    }

    let number = form.contact_number.trim();
    if number.is_empty() {
        errors.add(Field::ContactNumber, "Contact number is required");
    } else if number.len() != CONTACT_NUMBER_DIGITS || !number.bytes().all(|b| b.is_ascii_digit()) {
        errors.add(Field::ContactNumber, "Contact number must be 10 digits");
    }

    let people = match form.number_of_people.trim().parse::<u32>() {
        Ok(n) if n >= 1 => n,
        Ok(_) => {
            errors.add(Field::NumberOfPeople, "Number of people must be at least 1");
            0
        }
        Err(_) => {
            errors.add(Field::NumberOfPeople, "Number of people must be a number");
            0
        }
    };

    if form.city.is_none() {
        errors.add(Field::City, "City is required");
    }
    if form.categories.is_empty() {
        errors.add(Field::Categories, "Select at least one item");
    }

    match (&form.city, errors.is_empty()) {
        (Some(city), true) => Ok(NeedInput {
            contact_person_name: name.to_string(),
            contact_number: number.to_string(),
            city_id: city.value,
            number_of_people: people,
            categories: form.categories.iter().map(|c| c.value).collect(),
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> RequestForm {
        RequestForm {
            contact_person_name: "  Nimal Perera ".into(),
            contact_number: "0771234567".into(),
            city: Some(SelectOption::new(1, "Cityville")),
            number_of_people: "4".into(),
            categories: vec![SelectOption::new(3, "Rice"), SelectOption::new(5, "Milk powder")],
            agree_to_terms: false,
        }
    }

    #[test]
    fn valid_form_becomes_need_input() {
        let need = validate_request(&filled()).unwrap();
        assert_eq!(need.contact_person_name, "Nimal Perera");
        assert_eq!(need.city_id, 1);
        assert_eq!(need.number_of_people, 4);
        assert_eq!(need.categories, vec![3, 5]);
    }

    #[test]
    fn empty_form_reports_every_field() {
        let errors = validate_request(&RequestForm::default()).unwrap_err();
        let fields: Vec<Field> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![
                Field::ContactPersonName,
                Field::ContactNumber,
                Field::City,
                Field::NumberOfPeople,
                Field::Categories,
            ]
        );
        assert_eq!(errors.to_string(), "5 field(s) need attention");
    }

    #[test]
    fn contact_number_needs_exactly_ten_digits() {
        for bad in ["077123456", "07712345678", "077-123456", "07712345a7"] {
            let form = RequestForm {
                contact_number: bad.into(),
                ..filled()
            };
            let errors = validate_request(&form).unwrap_err();
            assert_eq!(
                errors.get(Field::ContactNumber),
                Some("Contact number must be 10 digits"),
                "{bad}"
            );
        }
    }

    #[test]
    fn at_least_one_person() {
        let form = RequestForm {
            number_of_people: "0".into(),
            ..filled()
        };
        assert_eq!(
            validate_request(&form).unwrap_err().get(Field::NumberOfPeople),
            Some("Number of people must be at least 1")
        );
    }
}
