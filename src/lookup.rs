use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;

use crate::models::{CounterLabels, Dimension};

const COUNTRIES_CSV: &str = include_str!("../data/countries.csv");
const UNIVERSITIES_CSV: &str = include_str!("../data/universities.csv");

/// Resolves display labels for one dimension's keys.
pub trait LabelResolver: Send + Sync {
    /// Labels stored on a counter document when it is first created.
    fn labels(&self, key: &str) -> CounterLabels;

    /// Label shown when a stored document carries none.
    fn fallback_label(&self, key: &str) -> String;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct University {
    pub key: String,
    pub short: String,
    pub full: String,
}

pub fn normalize_country_code(code: &str) -> String {
    let code = code.trim();
    if code.starts_with('+') {
        code.to_string()
    } else {
        format!("+{code}")
    }
}

pub fn normalize_university_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct CountryDirectory {
    countries: Vec<Country>,
    by_code: HashMap<String, usize>,
}

impl CountryDirectory {
    pub fn bundled() -> Result<Self, csv::Error> {
        Self::from_reader(COUNTRIES_CSV.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let countries = csv::Reader::from_reader(reader)
            .deserialize::<Country>()
            .collect::<Result<Vec<_>, _>>()?;
        let by_code = countries
            .iter()
            .enumerate()
            .map(|(index, country)| (country.code.clone(), index))
            .collect();

        Ok(Self { countries, by_code })
    }

    pub fn name(&self, code: &str) -> String {
        let code = normalize_country_code(code);
        match self.by_code.get(&code) {
            Some(&index) => self.countries[index].name.clone(),
            None => code,
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(&normalize_country_code(code))
    }

    pub fn all(&self) -> &[Country] {
        &self.countries
    }
}

impl LabelResolver for CountryDirectory {
    fn labels(&self, key: &str) -> CounterLabels {
        CounterLabels {
            label: Some(self.name(key)),
            short_label: None,
        }
    }

    fn fallback_label(&self, key: &str) -> String {
        self.name(key)
    }
}

#[derive(Debug, Clone)]
pub struct UniversityDirectory {
    universities: HashMap<String, University>,
}

impl UniversityDirectory {
    pub fn bundled() -> Result<Self, csv::Error> {
        Self::from_reader(UNIVERSITIES_CSV.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let universities = csv::Reader::from_reader(reader)
            .deserialize::<University>()
            .map(|row| row.map(|university| (university.key.clone(), university)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { universities })
    }

    pub fn full_name(&self, key: &str) -> String {
        let key = normalize_university_key(key);
        match self.universities.get(&key) {
            Some(university) => university.full.clone(),
            None => key,
        }
    }

    pub fn short_name(&self, key: &str) -> String {
        let key = normalize_university_key(key);
        match self.universities.get(&key) {
            Some(university) => university.short.clone(),
            None => key,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.universities
            .contains_key(&normalize_university_key(key))
    }

    /// Every university, sorted by full name.
    pub fn all(&self) -> Vec<&University> {
        let mut all: Vec<&University> = self.universities.values().collect();
        all.sort_by(|a, b| a.full.cmp(&b.full));
        all
    }
}

impl LabelResolver for UniversityDirectory {
    fn labels(&self, key: &str) -> CounterLabels {
        CounterLabels {
            label: Some(self.full_name(key)),
            short_label: Some(self.short_name(key)),
        }
    }

    fn fallback_label(&self, key: &str) -> String {
        self.full_name(key)
    }
}

/// Both lookup tables, indexed by the dimension they label.
#[derive(Debug, Clone)]
pub struct Directories {
    pub countries: CountryDirectory,
    pub universities: UniversityDirectory,
}

impl Directories {
    pub fn bundled() -> Result<Self, csv::Error> {
        Ok(Self {
            countries: CountryDirectory::bundled()?,
            universities: UniversityDirectory::bundled()?,
        })
    }

    pub fn resolver(&self, dimension: Dimension) -> &dyn LabelResolver {
        match dimension {
            Dimension::Country => &self.countries,
            Dimension::University => &self.universities,
        }
    }
}
