//! Named and positional execution parameter helpers.
//!
//! The two forms are exclusive. Adding a named parameter to an event that
//! already holds positional parameters is ignored so the positional form wins
//! on the wire; adding a positional parameter replaces a named map.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use tracing::debug;

use super::Event;
use super::sections::ExecParams;
use crate::error::EventError;

const PARAMS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::params");

impl Event {
    /// Sets a named parameter, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn add_param(
        &mut self,
        name: impl Into<String>,
        value: impl Display,
    ) -> Result<(), EventError> {
        let key: String = name.into();
        let params = self.exec_params_mut()?;
        match params {
            ExecParams::Positional(values) if !values.is_empty() => {
                debug!(
                    target: PARAMS_TARGET,
                    name = %key,
                    "ignoring named parameter on positional event"
                );
            }
            ExecParams::Named(values) => {
                values.insert(key, value.to_string());
            }
            ExecParams::Empty | ExecParams::Positional(_) => {
                *params = ExecParams::Named(BTreeMap::from([(key, value.to_string())]));
            }
        }
        Ok(())
    }

    /// Returns a named parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingParam`] when the parameter is absent and
    /// [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn param(&self, name: &str) -> Result<&str, EventError> {
        let value = match self.exec_params()? {
            ExecParams::Named(values) => values.get(name).map(String::as_str),
            ExecParams::Empty | ExecParams::Positional(_) => None,
        };
        value.ok_or_else(|| EventError::MissingParam {
            name: name.to_owned(),
        })
    }

    /// Returns a named parameter parsed into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidParam`] when the value does not parse, in
    /// addition to the errors of [`Event::param`].
    pub fn param_as<T>(&self, name: &str) -> Result<T, EventError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.param(name)?;
        parse_value(name, value)
    }

    /// Returns true when the named parameter is present.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn has_param(&self, name: &str) -> Result<bool, EventError> {
        Ok(match self.exec_params()? {
            ExecParams::Named(values) => values.contains_key(name),
            ExecParams::Empty | ExecParams::Positional(_) => false,
        })
    }

    /// Removes a named parameter and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn remove_param(&mut self, name: &str) -> Result<Option<String>, EventError> {
        Ok(match self.exec_params_mut()? {
            ExecParams::Named(values) => values.remove(name),
            ExecParams::Empty | ExecParams::Positional(_) => None,
        })
    }

    /// Appends a positional parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn add_script_param(&mut self, value: impl Display) -> Result<(), EventError> {
        let params = self.exec_params_mut()?;
        if let ExecParams::Positional(values) = params {
            values.push(value.to_string());
        } else {
            *params = ExecParams::Positional(vec![value.to_string()]);
        }
        Ok(())
    }

    /// Returns the number of positional parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while execution parameters are
    /// deferred.
    pub fn script_param_count(&self) -> Result<usize, EventError> {
        Ok(match self.exec_params()? {
            ExecParams::Positional(values) => values.len(),
            ExecParams::Empty | ExecParams::Named(_) => 0,
        })
    }

    /// Returns the positional parameter at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingScriptParam`] when the index is out of
    /// range and [`EventError::NotMaterialized`] while execution parameters
    /// are deferred.
    pub fn script_param(&self, index: usize) -> Result<&str, EventError> {
        let value = match self.exec_params()? {
            ExecParams::Positional(values) => values.get(index).map(String::as_str),
            ExecParams::Empty | ExecParams::Named(_) => None,
        };
        value.ok_or(EventError::MissingScriptParam { index })
    }

    /// Returns the positional parameter at `index` parsed into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidParam`] when the value does not parse, in
    /// addition to the errors of [`Event::script_param`].
    pub fn script_param_as<T>(&self, index: usize) -> Result<T, EventError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.script_param(index)?;
        parse_value(&index.to_string(), value)
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, EventError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|error: T::Err| EventError::InvalidParam {
        name: name.to_owned(),
        value: value.to_owned(),
        message: error.to_string(),
    })
}
