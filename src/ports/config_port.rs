//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Section names, sorted.
    fn sections(&self) -> Vec<String>;

    /// Keys of `section`, sorted. Empty when the section does not exist.
    fn keys(&self, section: &str) -> Vec<String>;
}
