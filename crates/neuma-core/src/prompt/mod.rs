pub mod assembler;
pub mod directive;
pub mod hashtag;

pub use assembler::{AssembledTurn, AssemblyWarning, PromptAssembler};
pub use directive::{
    DirectiveKind, DirectiveResolver, DirectiveUnresolved, FetchedPage, FileReader,
    FsFileReader, HttpWebFetcher, Resolution, WebFetcher,
};
pub use hashtag::{find_hashtag, normalize};
