mod interp;
mod option;
mod preprocessor;
mod properties;
mod source;

pub use interp::{eval_expr, interpret, parse_render_targets, ExprError, InterpretOutput, Num};
pub use option::{
    parse_const, parse_define, value_matches, DedupOptionList, Mutability, OptionKind,
    ShaderOption, Value,
};
pub use preprocessor::{MacroBuilder, NativeBuffer, Preprocessor, Stage1, Stage2};
pub use properties::{Quality, ShaderProperties};
pub use source::{
    mark_multiline_comments, ContentProvider, DirProvider, Includer, MemProvider, Tag, TaggedLine,
    INTERNAL_SOURCE,
};
