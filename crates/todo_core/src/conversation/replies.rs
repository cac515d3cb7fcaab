//! User-facing reply texts.

pub const START: &str = "Hello. I am TODO bot. You can add to me your jobs with \
dates when it should be done and I remind it to.\n\
Supported commands: \n\
/start - show this message\n\
/newitem - add new job\n\
/items - show all jobs for some day\n\
/subscribe - subscribe to job reminder\n\
/unsubscribe - unsubscribe from job reminder\n\
/done - mark some TODO job done\n\
/cancel - cancel current operation\n\
Have a good day!";

pub const BUSY: &str = "Please complete current operation or cancel it using /cancel.";
pub const UNKNOWN_COMMAND: &str =
    "I don't know that command. Enter /start to see list of commands.";
pub const IDLE_HINT: &str = "Please enter some command. Enter /start to see list of commands.";

pub const ENTER_JOB: &str = "Please Enter new job.";
pub const ENTER_DATE: &str = "Please Enter date in format dd-mm-yyyy.";
pub const ENTER_SHOW_DATE: &str =
    "Please enter date for which you want to see jobs in format dd-mm-yyyy.";
pub const ENTER_DONE_DATE: &str =
    "Please enter day where done job is placed in format dd-mm-yyyy.";
pub const BAD_DATE: &str = "Could not parse date. Try again in format dd-mm-yyyy.";

pub const JOB_ADDED: &str = "Your job was added.";
pub const PRESS_BUTTON: &str = "Press the button on keyboard or type appropriate number.";
pub const OPERATION_CANCELED: &str = "Operation canceled.";
pub const WELL_DONE: &str = "Well done!";

pub const CANCELLED: &str = "Current operation was cancelled.";
pub const IDLE_ALREADY: &str = "I am Idle already.";

pub const SUBSCRIBED: &str = "You are subscribed now. To unsubscribe enter /unsubscribe command.";
pub const ALREADY_SUBSCRIBED: &str =
    "You are already subscribed. To unsubscribe enter /unsubscribe command.";
pub const UNSUBSCRIBED: &str = "You are unsubscribed now.";
pub const NOT_SUBSCRIBED: &str = "You are not subscribed.";

pub const READ_FAILED: &str = "Could not read from database. Try operation again.";
pub const WRITE_FAILED: &str = "Could not write to database. Try operation again.";
