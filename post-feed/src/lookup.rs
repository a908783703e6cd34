use crate::page::RawPage;
use interfaces::defs::PostView;
use std::sync::Arc;

/// Every copy of the post `uri` held in fetched pages: the post itself,
/// quotes of it and inline reply parents or roots.
pub fn find_all_posts_in_pages(pages: &[Arc<RawPage>], uri: &str) -> Vec<PostView> {
    let mut found = Vec::new();
    for item in pages.iter().flat_map(|page| page.feed.iter()) {
        if item.post.uri == uri {
            found.push(item.post.clone());
        }
        if let Some(quoted) = item.post.quoted_record() {
            if quoted.uri == uri {
                found.push(PostView::from(quoted));
            }
        }
        if let Some(reply) = &item.reply {
            for target in [&reply.parent, &reply.root] {
                if let Some(post) = target.as_post() {
                    if post.uri == uri {
                        found.push(post.clone());
                    }
                }
            }
        }
    }
    found
}
