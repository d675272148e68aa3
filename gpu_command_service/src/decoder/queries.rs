/// Query commands
///
/// Query ids come from the group's query namespace, but query objects are
/// per decoder and only created by the first `BeginQueryEXT`, which also
/// fixes the query's target and sync record.

use super::commands as cmd;
use super::{claim_ids, done, immediate_ids, CommandError, CommandResult, Decoder};
use crate::context_group::{GroupResources, IdNamespace};
use crate::gl;
use crate::query::{QuerySync, QUERY_SYNC_SIZE};

impl Decoder {
    pub(super) fn gen_queries(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GenQueriesEXTImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenQueriesEXT", "n < 0");
        };
        let queries = self.queries.as_ref().ok_or(CommandError::GenericError)?;
        if !claim_ids(res, IdNamespace::Queries, ids, |_, id| queries.get_query(id).is_some()) {
            return Err(CommandError::InvalidArguments);
        }
        done()
    }

    pub(super) fn delete_queries(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteQueriesEXTImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteQueriesEXT", "n < 0");
        };
        let queries = self.queries.as_mut().ok_or(CommandError::GenericError)?;
        for &id in ids {
            queries.remove_query(id, Some(self.driver.as_mut()));
            res.id_allocator(IdNamespace::Queries).free_id(id);
        }
        done()
    }

    pub(super) fn begin_query(&mut self, res: &mut GroupResources<'_>, c: cmd::BeginQueryEXT) -> CommandResult {
        const FUNC: &str = "glBeginQueryEXT";
        if !res.features.validators.query_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if c.id == 0 {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "id is 0");
        }
        let queries = self.queries.as_ref().ok_or(CommandError::GenericError)?;
        let existing = queries.get_query(c.id);
        if queries.active_query(c.target).is_some() {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "query already active");
        }
        let key = match existing {
            Some(key) => {
                let target = self.queries.as_ref().and_then(|q| q.query(key)).map(|q| q.target());
                if target != Some(c.target) {
                    return self.set_error(gl::INVALID_OPERATION, FUNC, "target does not match");
                }
                key
            }
            None => {
                if !res.id_in_use(IdNamespace::Queries, c.id) {
                    return self.set_error(gl::INVALID_OPERATION, FUNC, "id not made by glGenQueriesEXT");
                }
                let window = self.shm(c.sync_shm_id, c.sync_shm_offset, QUERY_SYNC_SIZE)?;
                let sync = QuerySync::new(window).ok_or(CommandError::InvalidArguments)?;
                let queries = self.queries.as_mut().ok_or(CommandError::GenericError)?;
                let Some(key) = queries.create_query(c.target, c.id, sync, self.driver.as_mut()) else {
                    return self.invalid_enum(FUNC, c.target, "target");
                };
                key
            }
        };
        let queries = self.queries.as_mut().ok_or(CommandError::GenericError)?;
        if let Err(err) = queries.begin_query(key, self.driver.as_mut()) {
            return self.set_error(err.gl_error(), FUNC, "query already active");
        }
        done()
    }

    pub(super) fn end_query(&mut self, c: cmd::EndQueryEXT) -> CommandResult {
        let queries = self.queries.as_mut().ok_or(CommandError::GenericError)?;
        let transfers = self.transfers.as_ref().ok_or(CommandError::GenericError)?;
        let errors = &mut self.errors;
        let ended = queries.end_query(c.target, c.submit_count, self.driver.as_mut(), transfers, |driver| {
            errors.get_gl_error(driver)
        });
        if let Err(err) = ended {
            return self.set_error(err.gl_error(), "glEndQueryEXT", "no active query");
        }
        done()
    }
}

#[cfg(test)]
#[path = "queries_tests.rs"]
mod tests;
