//! Service-level operations.

use basalt_model::S3Error;
use basalt_xml::responses::ListBucketsPage;
use basalt_xml::to_xml;

use crate::request::{RequestContext, S3Response};
use crate::state::ServiceState;

/// `GET /` — list the caller's buckets.
pub(crate) async fn list_buckets(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    if ctx.principal.is_anonymous() {
        return Err(S3Error::access_denied("ListBuckets"));
    }
    let owner = ctx.principal.to_owner();
    let buckets = state.index.list_buckets(Some(&owner.id))?;
    let page = ListBucketsPage { owner, buckets };
    let document = to_xml("ListAllMyBucketsResult", &page)
        .map_err(|e| S3Error::internal("failed to serialize bucket listing").with_source(e))?;
    Ok(S3Response::xml(document))
}
