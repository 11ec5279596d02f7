// Container -> MIME mapping (§6.3).

use crate::model::Container;

/// ```
/// use loopcut_core::helpers::mime::mime_type;
/// use loopcut_core::model::Container;
/// assert_eq!(mime_type(Container::Mp4), "video/mp4");
/// assert_eq!(mime_type(Container::Webm), "video/webm");
/// ```
pub fn mime_type(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "video/mp4",
        Container::Webm => "video/webm",
    }
}
