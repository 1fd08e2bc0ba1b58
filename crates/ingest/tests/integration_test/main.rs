mod failure_isolation;
mod helpers;
mod pipeline_run;
