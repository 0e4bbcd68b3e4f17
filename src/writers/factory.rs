use super::{BaronWriter, GamsWriter, LpWriter, NlWriter};
use crate::domain::model::Model;
use crate::domain::symbol_map::SymbolMap;
use crate::domain::value_objects::ProblemFormat;
use crate::domain::writer_service::{ProblemWriter, Result, WriterError, WriterOptions};
use std::path::Path;

/// Factory for creating writers based on the requested format
pub struct WriterFactory;

impl WriterFactory {
    /// Create the writer for a specific format
    pub fn create(format: ProblemFormat) -> Box<dyn ProblemWriter> {
        match format {
            ProblemFormat::Lp => Box::new(LpWriter::new()),
            ProblemFormat::Gams => Box::new(GamsWriter::new()),
            ProblemFormat::Baron => Box::new(BaronWriter::new()),
            ProblemFormat::Nl => Box::new(NlWriter::new()),
        }
    }

    /// Create the writer matching the extension of `path`
    pub fn for_path(path: &Path) -> Result<Box<dyn ProblemWriter>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ProblemFormat::from_extension)
            .map(Self::create)
            .ok_or_else(|| {
                WriterError::InvalidOptions(format!(
                    "can not guess the file format of '{}'",
                    path.display()
                ))
            })
    }
}

impl Model {
    /// Write the model to `path`, guessing the format from the extension
    /// unless one is given
    pub fn write(
        &self,
        path: impl AsRef<Path>,
        format: Option<ProblemFormat>,
        options: &WriterOptions,
    ) -> Result<SymbolMap> {
        let path = path.as_ref();
        let writer = match format {
            Some(format) => WriterFactory::create(format),
            None => WriterFactory::for_path(path)?,
        };
        writer.write_to_path(self, path, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_guessed_from_extensions() {
        for format in ProblemFormat::ALL {
            let path = format!("model.{}", format.extension());
            let writer = WriterFactory::for_path(Path::new(&path)).unwrap();
            assert_eq!(writer.format(), format);
        }
        assert!(WriterFactory::for_path(Path::new("model.txt")).is_err());
        assert!(WriterFactory::for_path(Path::new("model")).is_err());
    }
}
