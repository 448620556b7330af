use std::{
    fmt::{Display, Formatter},
    ops::{Deref, DerefMut},
};

pub(crate) struct SpecWriter<'a, 'b>(&'a mut Formatter<'b>);

impl<'a, 'b> Deref for SpecWriter<'a, 'b> {
    type Target = Formatter<'b>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<'a, 'b> DerefMut for SpecWriter<'a, 'b> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<'a, 'b> SpecWriter<'a, 'b> {
    pub(crate) fn new(f: &'a mut Formatter<'b>) -> Self {
        Self(f)
    }

    pub(crate) fn line<T: Display>(&mut self, value: T) -> std::fmt::Result {
        writeln!(self, "{value}")
    }

    pub(crate) fn lines<T: Display>(&mut self, key: &str, values: &[T]) -> std::fmt::Result {
        if values.is_empty() {
            return Ok(());
        }
        self.line(key)?;
        for val in values {
            self.line(val)?;
        }
        Ok(())
    }

    pub(crate) fn kv_colon<T: Display>(&mut self, key: &str, value: T) -> std::fmt::Result {
        writeln!(self, "{key}: {value}")
    }

    pub(crate) fn opt_kv_colon<T: Display>(
        &mut self,
        key: &str,
        value: Option<T>,
    ) -> std::fmt::Result {
        if let Some(value) = value {
            self.kv_colon(key, value)?;
        }
        Ok(())
    }
}
