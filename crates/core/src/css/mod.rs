pub mod selector;

pub use selector::{AttrOp, Combinator, Selector, SelectorList, SelectorPart};
