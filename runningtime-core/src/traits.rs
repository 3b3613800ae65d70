use crate::imports::*;

/// Lowercase file extension of `filepath`, used to pick a format
fn format_of(filepath: &Path) -> anyhow::Result<String> {
    filepath
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase)
        .with_context(|| format!("File extension could not be parsed: {filepath:?}"))
}

/// Loading and saving of tracks, parameters and results. Types that need
/// more than serde to be usable (a sentinel appended, fields checked) do it
/// in [init](SerdeAPI::init), which every loader calls.
pub trait SerdeAPI: Serialize + for<'a> Deserialize<'a> {
    /// Formats understood by [from_reader](SerdeAPI::from_reader) and
    /// [to_writer](SerdeAPI::to_writer), by file extension
    const ACCEPTED_FORMATS: &'static [&'static str] = &["yaml", "json"];

    /// Runs after every load
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Loads from a file bundled in `runningtime-core/resources`, e.g.
    /// `tracks/curve.csv`
    #[cfg(feature = "resources")]
    fn from_resource<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = format_of(filepath)?;
        let file = crate::resources::RESOURCES_DIR
            .get_file(filepath)
            .with_context(|| format!("File not found in resources: {filepath:?}"))?;
        Self::from_reader(file.contents(), &format)
    }

    /// Saves to `filepath` in the format its extension names, truncating any
    /// existing file
    fn to_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        let format = format_of(filepath)?;
        self.to_writer(File::create(filepath)?, &format)
    }

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: &str) -> anyhow::Result<()> {
        match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::to_writer(wtr, self)?,
            "json" => serde_json::to_writer(wtr, self)?,
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_FORMATS
            ),
        }
        Ok(())
    }

    /// Loads from `filepath` in the format its extension names
    fn from_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = format_of(filepath)?;
        let file = File::open(filepath).with_context(|| {
            if !filepath.exists() {
                format!("File not found: {filepath:?}")
            } else {
                format!("Could not open file: {filepath:?}")
            }
        })?;
        Self::from_reader(file, &format)
    }

    fn from_reader<R: std::io::Read>(rdr: R, format: &str) -> anyhow::Result<Self> {
        let mut deserialized: Self = match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::from_reader(rdr)?,
            "json" => serde_json::from_reader(rdr)?,
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_FORMATS
            ),
        };
        deserialized.init()?;
        Ok(deserialized)
    }

    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self)?)
    }

    /// Parses a JSON string and runs [init](SerdeAPI::init)
    fn from_json<S: AsRef<str>>(json_str: S) -> anyhow::Result<Self> {
        let mut json_de: Self = serde_json::from_str(json_str.as_ref())?;
        json_de.init()?;
        Ok(json_de)
    }

    fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }

    /// Parses a YAML string and runs [init](SerdeAPI::init)
    fn from_yaml<S: AsRef<str>>(yaml_str: S) -> anyhow::Result<Self> {
        let mut yaml_de: Self = serde_yaml::from_str(yaml_str.as_ref())?;
        yaml_de.init()?;
        Ok(yaml_de)
    }
}

pub trait ApproxEq<Rhs = Self> {
    fn approx_eq(&self, other: &Rhs, tol: f64) -> bool;
}

macro_rules! impl_approx_eq_for_strict_eq_types {
    ($($strict_eq_type: ty),*) => {
        $(
            impl ApproxEq for $strict_eq_type {
                fn approx_eq(&self, other: &$strict_eq_type, _tol: f64) -> bool {
                    self == other
                }
            }
        )*
    }
}

impl_approx_eq_for_strict_eq_types!(u8, u16, u32, u64, usize, i32, i64, bool, String);

macro_rules! impl_approx_eq_for_floats {
    ($($float_type: ty),*) => {
        $(
            impl ApproxEq for $float_type {
                fn approx_eq(&self, other: &$float_type, tol: f64) -> bool {
                    (((other - self) / (self + other)).abs() as f64) < tol || ((other - self).abs() as f64) < tol
                }
            }
        )*
    }
}

impl_approx_eq_for_floats!(f32, f64);

impl<T> ApproxEq for Vec<T>
where
    T: ApproxEq,
{
    fn approx_eq(&self, other: &Vec<T>, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(x, y)| x.approx_eq(y, tol))
    }
}

impl<T> ApproxEq for Option<T>
where
    T: ApproxEq,
{
    fn approx_eq(&self, other: &Option<T>, tol: f64) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(x), Some(y)) => x.approx_eq(y, tol),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq_floats() {
        assert!(1.0_f64.approx_eq(&(1.0 + 1e-10), 1e-8));
        assert!(!1.0_f64.approx_eq(&1.1, 1e-8));
        // absolute tolerance saves comparisons near zero
        assert!(0.0_f64.approx_eq(&1e-12, 1e-8));
    }

    #[test]
    fn test_format_of() {
        assert_eq!(format_of(Path::new("tracks/curve.CSV")).unwrap(), "csv");
        assert!(format_of(Path::new("tracks/curve")).is_err());
    }

    #[test]
    fn test_approx_eq_vec_length_mismatch() {
        assert!(!vec![1.0, 2.0].approx_eq(&vec![1.0], 1e-8));
        assert!(vec![Some(1.0), None].approx_eq(&vec![Some(1.0), None], 1e-8));
    }
}
