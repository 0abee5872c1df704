/// What a component did with a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing for the owner to do
  Handled,
  /// Consumed and produced an event for the owning view
  Event(T),
  /// Ignored; the view should try its own bindings
  NotHandled,
}

impl<T> KeyResult<T> {
  /// Whether the component took the key.
  pub fn consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}
