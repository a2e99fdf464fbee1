mod accounts;
mod files;
mod groups;
mod history;
mod jobs;
mod posts;
mod retention;
mod sidebar;
mod system;
