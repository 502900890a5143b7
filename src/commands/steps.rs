//! Step factories shared by the conversion commands

use std::sync::Arc;

use crate::convert::unit::is_valid_epoch;
use crate::convert::{converter::is_valid_iso_rfc, is_valid_format, is_valid_iso_duration};
use crate::convert::{Conversion, Converter, CustomFormat, EpochUnit};
use crate::flow::{ChoiceStep, Step, TextInputStep, PRIOR_RESULT_TOKEN};
use crate::host::{ChoiceItem, PromptHost};

/// Label of the item that opens a free-text custom format input
pub const OTHER_FORMAT_LABEL: &str = "Other format...";

/// Steps of one command
pub struct CommandSteps {
    /// One step per conversion parameter, in parameter order
    pub steps: Vec<Arc<dyn Step>>,
    /// Format choices whose items follow the configured custom formats
    pub format_choices: Vec<Arc<ChoiceStep>>,
}

/// Builds the steps of each conversion
#[derive(Clone)]
pub struct StepFactory {
    host: Arc<dyn PromptHost>,
    converter: Converter,
}

impl StepFactory {
    pub fn new(host: Arc<dyn PromptHost>, converter: Converter) -> Self {
        Self { host, converter }
    }

    /// Steps for `conversion` with `formats` feeding the format choices
    pub fn build(&self, conversion: Conversion, title: &str, formats: &[String]) -> CommandSteps {
        let mut format_choices = Vec::new();
        let mut format_choice = |name: &str, prompt: &str| -> Arc<dyn Step> {
            let choice = self.format_choice(name, title, prompt, formats);
            format_choices.push(Arc::clone(&choice));
            choice
        };

        let steps: Vec<Arc<dyn Step>> = match conversion {
            Conversion::EpochToIsoUtc
            | Conversion::EpochToIsoLocal
            | Conversion::EpochToIsoDuration
            | Conversion::EpochToReadableDuration => vec![
                self.epoch_input(title),
                self.unit_choice("unit", title, "Unit of the epoch"),
            ],
            Conversion::EpochToCustom => vec![
                self.epoch_input(title),
                self.unit_choice("unit", title, "Unit of the epoch"),
                format_choice("format", "Target format"),
            ],
            Conversion::IsoRfcToEpoch => vec![
                self.iso_rfc_input(title),
                self.unit_choice("unit", title, "Target unit"),
            ],
            Conversion::IsoRfcToCustom => vec![
                self.iso_rfc_input(title),
                format_choice("format", "Target format"),
            ],
            Conversion::IsoDurationToEpoch => vec![
                self.iso_duration_input(title),
                self.unit_choice("unit", title, "Target unit"),
            ],
            Conversion::CustomToEpoch => vec![
                format_choice("format", "Format of the date"),
                self.custom_date_input(title),
                self.unit_choice("unit", title, "Target unit"),
            ],
            Conversion::CustomToIsoUtc | Conversion::CustomToIsoLocal => vec![
                format_choice("format", "Format of the date"),
                self.custom_date_input(title),
            ],
            Conversion::CustomToCustom => vec![
                format_choice("format", "Format of the date"),
                self.custom_date_input(title),
                format_choice("targetFormat", "Target format"),
            ],
            Conversion::NowAsEpoch => vec![self.unit_choice("unit", title, "Target unit")],
            Conversion::NowAsIsoUtc | Conversion::NowAsIsoLocal => Vec::new(),
            Conversion::NowAsCustom => vec![format_choice("format", "Target format")],
        };

        CommandSteps {
            steps,
            format_choices,
        }
    }

    /// Epoch text input, skipped when the selection already is an epoch
    pub fn epoch_input(&self, title: &str) -> Arc<dyn Step> {
        TextInputStep::builder("epoch", Arc::clone(&self.host))
            .title(title)
            .prompt("Enter an epoch")
            .placeholder("1700000000")
            .validator(|input, _| is_valid_epoch(input))
            .validation_message("Not a valid epoch")
            .skip(true)
            .build()
    }

    /// ISO 8601 / RFC 2822 date input, skipped when the selection parses
    pub fn iso_rfc_input(&self, title: &str) -> Arc<dyn Step> {
        TextInputStep::builder("date", Arc::clone(&self.host))
            .title(title)
            .prompt("Enter an ISO 8601 or RFC 2822 date")
            .placeholder("2023-11-14T22:13:20Z")
            .validator(|input, _| is_valid_iso_rfc(input))
            .validation_message("Not a valid ISO 8601 or RFC 2822 date")
            .skip(true)
            .build()
    }

    pub fn iso_duration_input(&self, title: &str) -> Arc<dyn Step> {
        TextInputStep::builder("duration", Arc::clone(&self.host))
            .title(title)
            .prompt("Enter an ISO 8601 duration")
            .placeholder("P1DT2H30M")
            .validator(|input, _| is_valid_iso_duration(input))
            .validation_message("Not a valid ISO 8601 duration")
            .skip(true)
            .build()
    }

    /// Date input checked against the format chosen by the previous step
    pub fn custom_date_input(&self, title: &str) -> Arc<dyn Step> {
        let converter = self.converter;
        TextInputStep::builder("date", Arc::clone(&self.host))
            .title(title)
            .prompt(format!("Enter a date in format {}", PRIOR_RESULT_TOKEN))
            .placeholder(PRIOR_RESULT_TOKEN)
            .validator(move |input, format| {
                format.is_some_and(|format| converter.is_valid_custom_date(format, input))
            })
            .validation_message(format!("Date does not match {}", PRIOR_RESULT_TOKEN))
            .skip(true)
            .build()
    }

    /// Free-text custom format, dropped from the sequence when backed out of
    pub fn custom_format_input(&self, name: &str, title: &str) -> Arc<dyn Step> {
        TextInputStep::builder(name, Arc::clone(&self.host))
            .title(title)
            .prompt("Enter a custom format")
            .placeholder("YYYY-MM-DD HH:mm:ss")
            .validator(|input, _| is_valid_format(input))
            .validation_message("Not a valid custom format")
            .unregister_on_back(true)
            .build()
    }

    pub fn unit_choice(&self, name: &str, title: &str, placeholder: &str) -> Arc<dyn Step> {
        let items = EpochUnit::all()
            .iter()
            .map(|unit| {
                ChoiceItem::new(unit.label())
                    .with_description(unit.short_name())
                    .with_value(unit.short_name())
            })
            .collect();
        Arc::new(ChoiceStep::new(name, Arc::clone(&self.host), title, items).with_placeholder(placeholder))
    }

    /// Choice over the configured formats with an escape to free text
    pub fn format_choice(
        &self,
        name: &str,
        title: &str,
        placeholder: &str,
        formats: &[String],
    ) -> Arc<ChoiceStep> {
        let alternative = self.custom_format_input(&format!("{} (custom)", name), title);
        Arc::new(
            ChoiceStep::new(name, Arc::clone(&self.host), title, self.format_items(formats))
                .with_placeholder(placeholder)
                .with_other(ChoiceItem::new(OTHER_FORMAT_LABEL), alternative)
                .with_dynamic_items(),
        )
    }

    /// One item per valid format, described by the current time rendered
    /// in it
    pub fn format_items(&self, formats: &[String]) -> Vec<ChoiceItem> {
        let now = self.converter.to_local(&self.converter.now());
        formats
            .iter()
            .filter_map(|pattern| match CustomFormat::parse(pattern) {
                Ok(format) => {
                    let item = ChoiceItem::new(pattern.clone());
                    Some(match format.format(&now) {
                        Ok(preview) => item.with_description(preview),
                        Err(_) => item,
                    })
                }
                Err(err) => {
                    tracing::warn!(format = %pattern, error = %err, "ignoring invalid custom format");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockPromptHost;
    use chrono::{TimeZone, Utc};

    fn factory() -> StepFactory {
        let converter = Converter::new()
            .with_local_offset(chrono::FixedOffset::east_opt(0).unwrap())
            .with_now(Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap());
        StepFactory::new(Arc::new(MockPromptHost::new()), converter)
    }

    fn formats() -> Vec<String> {
        vec!["YYYY-MM-DD".to_string(), "DD/MM/YYYY".to_string()]
    }

    #[test]
    fn test_steps_align_with_parameters() {
        let factory = factory();
        for conversion in Conversion::all() {
            let built = factory.build(*conversion, "title", &formats());
            assert_eq!(built.steps.len(), conversion.arity(), "{conversion}");
            for (step, parameter) in built.steps.iter().zip(conversion.parameters()) {
                assert_eq!(step.name(), *parameter, "{conversion}");
            }
        }
    }

    #[test]
    fn test_format_choices_are_tracked() {
        let factory = factory();
        let built = factory.build(Conversion::CustomToCustom, "title", &formats());
        assert_eq!(built.format_choices.len(), 2);
        assert!(built.format_choices.iter().all(|c| c.is_dynamic()));
        assert!(built.format_choices.iter().all(|c| c.alternative().is_some()));

        let built = factory.build(Conversion::EpochToIsoUtc, "title", &formats());
        assert!(built.format_choices.is_empty());
    }

    #[test]
    fn test_format_items_preview_and_filter() {
        let factory = factory();
        let items = factory.format_items(&[
            "YYYY-MM-DD".to_string(),
            "foo".to_string(),
            "[unterminated".to_string(),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "YYYY-MM-DD");
        assert_eq!(items[0].description.as_deref(), Some("2023-11-14"));
    }

    #[test]
    fn test_input_validators() {
        let factory = factory();
        let epoch = factory.epoch_input("t");
        assert!(epoch.skip());
        assert!(epoch.validate("1700000000", None));
        assert!(!epoch.validate("yesterday", None));

        let date = factory.custom_date_input("t");
        assert!(date.validate("14/11/2023", Some("DD/MM/YYYY")));
        assert!(!date.validate("2023-11-14", Some("DD/MM/YYYY")));
        assert!(!date.validate("14/11/2023", None));

        let custom = factory.custom_format_input("format (custom)", "t");
        assert!(custom.unregister_on_back());
        assert!(custom.validate("DD.MM.YYYY", None));
        assert!(!custom.validate("", None));
    }
}
