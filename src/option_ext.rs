/// Counterpart of `error::ResultExt` for `Option`, giving access to
/// `snafu::OptionExt::context` while `anyhow::Context` is in scope.
pub(crate) trait OptionExt<T>: Sized {
  fn snafu_context<C, E>(self, context: C) -> Result<T, E>
  where
    C: snafu::IntoError<E, Source = snafu::NoneError>,
    E: std::error::Error + snafu::ErrorCompat;
}

impl<T> OptionExt<T> for Option<T> {
  fn snafu_context<C, E>(self, context: C) -> Result<T, E>
  where
    C: snafu::IntoError<E, Source = snafu::NoneError>,
    E: std::error::Error + snafu::ErrorCompat,
  {
    snafu::OptionExt::context(self, context)
  }
}
